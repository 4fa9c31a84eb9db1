//! Connection settings

use std::path::Path;

use serde::Deserialize;

use crate::{Error, Result};

pub const DATABASE_ENV: &str = "STRATA_DATABASE";
pub const CACHE_ENV: &str = "STRATA_CACHE";
pub const CACHE_DRIVER_ENV: &str = "STRATA_CACHE_DRIVER";

/// Cache backend used when `CACHE_DRIVER` is not set
pub const DEFAULT_CACHE_DRIVER: &str = "database";

/// Protocols for the default database and the optional cache, plus the
/// name of the cache backend.
///
/// A protocol is `<driver>://<target>`, e.g. `sqlite3://data/app.db`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(rename = "DATABASE", default)]
    pub database: Option<String>,
    #[serde(rename = "CACHE", default)]
    pub cache: Option<String>,
    #[serde(rename = "CACHE_DRIVER", default)]
    pub cache_driver: Option<String>,
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Read `STRATA_DATABASE`, `STRATA_CACHE` and `STRATA_CACHE_DRIVER`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            database: read(DATABASE_ENV),
            cache: read(CACHE_ENV),
            cache_driver: read(CACHE_DRIVER_ENV),
        }
    }

    /// The database protocol, which every connection manager needs
    pub fn database_protocol(&self) -> Result<&str> {
        self.database
            .as_deref()
            .ok_or_else(|| Error::config("DATABASE is not set"))
    }

    /// The cache protocol, falling back to the database protocol
    pub fn cache_protocol(&self) -> Result<&str> {
        match self.cache.as_deref() {
            Some(protocol) => Ok(protocol),
            None => self.database_protocol(),
        }
    }

    pub fn cache_driver(&self) -> &str {
        self.cache_driver.as_deref().unwrap_or(DEFAULT_CACHE_DRIVER)
    }
}
