//! Driver lookup by protocol name

use std::collections::HashMap;
use std::sync::Arc;

use strata_core::{Connection, Database};
use tracing::info;

use crate::{Error, Result};

/// Opens a connection from the part of a protocol after `<driver>://`
pub type DriverFactory = fn(&str) -> Result<Arc<dyn Connection>>;

/// Maps driver names to connection factories
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every driver compiled into this crate
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "sqlite")]
        registry.register(
            crate::driver::sqlite::DRIVER_NAME,
            crate::driver::sqlite::SqliteConnection::open_shared,
        );
        registry
    }

    /// Register a factory, returning the one it replaced
    pub fn register(&mut self, name: &str, factory: DriverFactory) -> Option<DriverFactory> {
        self.drivers.insert(name.to_string(), factory)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Open a connection for `<driver>://<target>`
    pub fn connect(&self, protocol: &str) -> Result<Arc<dyn Connection>> {
        let (driver, target) = split_protocol(protocol)?;
        let factory = self
            .drivers
            .get(driver)
            .ok_or_else(|| Error::unknown_driver(driver))?;

        info!(driver, path = target, "opening database connection");
        factory(target)
    }

    /// Like [`connect`](Self::connect), wrapped in a [`Database`] handle
    pub fn open(&self, protocol: &str) -> Result<Database> {
        Ok(Database::new(self.connect(protocol)?))
    }
}

/// Split a protocol into its driver name and target
pub fn split_protocol(protocol: &str) -> Result<(&str, &str)> {
    let (driver, rest) = protocol
        .split_once(':')
        .ok_or_else(|| Error::invalid_protocol(protocol))?;
    if driver.is_empty() {
        return Err(Error::invalid_protocol(protocol));
    }
    Ok((driver, rest.strip_prefix("//").unwrap_or(rest)))
}
