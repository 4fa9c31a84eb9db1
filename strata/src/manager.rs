//! Process default connection
//!
//! [`DefaultConnection`] opens the configured `DATABASE` protocol on first
//! use and reopens it whenever the live connection reports it is no longer
//! connected. Builders and raw statements go through [`instance`]
//! (DefaultConnection::instance), so every call sees a live connection or a
//! `DeadResource` error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use strata_core::{
    ConditionQuery, DeleteQuery, InsertQuery, QueryResult, SelectQuery, UpdateQuery, Value,
    WhereConnector,
};
use tracing::{info, warn};

use crate::{Database, DriverRegistry, Result, Settings};

#[derive(Debug)]
pub struct DefaultConnection {
    registry: DriverRegistry,
    settings: Settings,
    current: Mutex<Option<Database>>,
    attempts: AtomicU64,
}

impl DefaultConnection {
    /// Connect through the drivers compiled into this crate
    pub fn new(settings: Settings) -> Self {
        Self::with_registry(settings, DriverRegistry::with_defaults())
    }

    pub fn with_registry(settings: Settings, registry: DriverRegistry) -> Self {
        Self {
            registry,
            settings,
            current: Mutex::new(None),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn from_env() -> Self {
        Self::new(Settings::from_env())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// How many times a connection has been opened
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Database>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live connection, opening a new one if there is none.
    ///
    /// A connection that failed to open is still returned; check
    /// `is_connected` or `connect_error` on it.
    pub fn instance(&self) -> Result<Database> {
        let mut current = self.lock();
        if let Some(db) = current.as_ref().filter(|db| db.is_connected()) {
            return Ok(db.clone());
        }

        let protocol = self
            .settings
            .database
            .as_deref()
            .ok_or(strata_core::Error::dead_resource("query"))?;

        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        if attempt > 1 {
            warn!(attempt, "default database reconnected for the {} time", attempt);
        }

        let db = self.registry.open(protocol)?;
        *current = Some(db.clone());
        Ok(db)
    }

    pub fn condition(&self, connector: impl Into<WhereConnector>) -> Result<ConditionQuery> {
        Ok(self.instance()?.condition(connector))
    }

    pub fn select(&self, table: &str) -> Result<SelectQuery> {
        Ok(self.instance()?.select(table))
    }

    pub fn select_as(&self, table: &str, alias: &str) -> Result<SelectQuery> {
        Ok(self.instance()?.select_as(table, alias))
    }

    pub fn select_bare(&self) -> Result<SelectQuery> {
        Ok(self.instance()?.select_bare())
    }

    pub fn insert(&self, table: &str) -> Result<InsertQuery> {
        Ok(self.instance()?.insert(table))
    }

    pub fn insert_as(&self, table: &str, alias: &str) -> Result<InsertQuery> {
        Ok(self.instance()?.insert_as(table, alias))
    }

    pub fn update(&self, table: &str) -> Result<UpdateQuery> {
        Ok(self.instance()?.update(table))
    }

    pub fn update_as(&self, table: &str, alias: &str) -> Result<UpdateQuery> {
        Ok(self.instance()?.update_as(table, alias))
    }

    pub fn delete(&self, table: &str) -> Result<DeleteQuery> {
        Ok(self.instance()?.delete(table))
    }

    pub fn delete_as(&self, table: &str, alias: &str) -> Result<DeleteQuery> {
        Ok(self.instance()?.delete_as(table, alias))
    }

    pub fn enquire(
        &self,
        sql: &str,
        types: &str,
        values: &[Value],
    ) -> Result<Option<Box<dyn QueryResult>>> {
        Ok(self.instance()?.enquire(sql, types, values)?)
    }

    pub fn execute(&self, sql: &str, types: &str, values: &[Value]) -> Result<u64> {
        Ok(self.instance()?.execute(sql, types, values)?)
    }

    pub fn escape(&self, value: impl Into<Value>) -> Result<String> {
        Ok(self.instance()?.escape(value))
    }

    pub fn connect_error(&self) -> Result<Option<String>> {
        Ok(self.instance()?.connect_error())
    }

    pub fn connect_errno(&self) -> Result<i32> {
        Ok(self.instance()?.connect_errno())
    }

    pub fn query_error(&self) -> Result<Option<String>> {
        Ok(self.instance()?.query_error())
    }

    pub fn query_errno(&self) -> Result<i32> {
        Ok(self.instance()?.query_errno())
    }

    pub fn is_connected(&self) -> bool {
        self.instance().map(|db| db.is_connected()).unwrap_or(false)
    }

    pub fn platform(&self) -> Option<String> {
        self.instance().ok().map(|db| db.platform().to_string())
    }

    pub fn driver(&self) -> Option<String> {
        self.instance().ok().map(|db| db.driver().to_string())
    }

    /// Close the live connection; the next call opens a new one
    pub fn close(&self) {
        if let Some(db) = self.lock().take() {
            db.close();
            info!("closed default database");
        }
    }
}

impl Drop for DefaultConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::sync::Arc;

    use strata_core::prelude::*;
    use strata_core::Connection;

    use super::*;
    use crate::Error;

    fn memory_settings() -> Settings {
        Settings {
            database: Some("sqlite3://:memory:".to_string()),
            ..Settings::default()
        }
    }

    #[test]
    fn test_missing_protocol_is_dead_resource() {
        let manager = DefaultConnection::new(Settings::default());
        let err = manager.select("users").unwrap_err();
        assert_eq!(err.to_string(), "Attempt to make query on dead resource");
        assert!(!manager.is_connected());
        assert_eq!(manager.platform(), None);
        assert_eq!(manager.driver(), None);
        assert_eq!(manager.attempts(), 0);
    }

    #[test]
    fn test_unknown_driver_propagates() {
        let manager = DefaultConnection::with_registry(
            Settings {
                database: Some("oracle://db".to_string()),
                ..Settings::default()
            },
            DriverRegistry::new(),
        );
        assert!(matches!(
            manager.execute("SELECT 1", "", &[]),
            Err(Error::UnknownDriver { .. })
        ));
    }

    #[test]
    fn test_reuses_live_connection() {
        let manager = DefaultConnection::new(memory_settings());
        manager
            .execute("CREATE TABLE notes (body TEXT)", "", &[])
            .unwrap();
        manager
            .insert("notes")
            .unwrap()
            .field("body", 's', "hello")
            .execute()
            .unwrap();

        let mut result = manager
            .select("notes")
            .unwrap()
            .field("body")
            .enquire()
            .unwrap()
            .unwrap();
        assert_eq!(result.fetch(true).unwrap(), vec![Value::from("hello")]);
        assert_eq!(manager.attempts(), 1);
        assert_eq!(manager.driver().as_deref(), Some("sqlite3"));
        assert_eq!(manager.platform().as_deref(), Some("SQLite3"));
        assert_eq!(manager.escape("it's").unwrap(), "'it''s'");
        assert_eq!(manager.query_errno().unwrap(), 0);
    }

    #[test]
    fn test_reconnects_after_close() {
        let manager = DefaultConnection::new(memory_settings());
        let first = manager.instance().unwrap();
        first.close();
        assert!(!first.is_connected());

        let second = manager.instance().unwrap();
        assert!(second.is_connected());
        assert!(!Arc::ptr_eq(first.connection(), second.connection()));
        assert_eq!(manager.attempts(), 2);

        manager.close();
        assert!(!second.connection().is_connected());
        assert!(manager.is_connected());
        assert_eq!(manager.attempts(), 3);
    }
}
