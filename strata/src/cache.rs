//! Key/value cache stored in a database table
//!
//! The cache is written and read far more often than anything else, so
//! [`DatabaseStorage`] compiles its UPDATE and SELECT once and only rebinds
//! their values on later calls.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::prelude::*;
use strata_core::{QueryResult, SelectQuery, UpdateQuery};
use tracing::{debug, info};

use crate::config::DEFAULT_CACHE_DRIVER;
use crate::{DriverRegistry, Encrypter, Error, Result, Settings};

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS cache (cKey TEXT PRIMARY KEY, cData TEXT, cExpires INTEGER)";

/// A cache backend
pub trait Storage: fmt::Debug {
    /// Store `value` as is. `expires` is a lifetime in seconds, 0 never
    /// expires.
    fn set_raw(&mut self, key: &str, value: &str, expires: i64) -> Result<bool>;

    /// The stored string, or `None` for a missing or expired key
    fn get_raw(&mut self, key: &str) -> Result<Option<String>>;

    /// Store any serializable value as JSON
    fn set<T>(&mut self, key: &str, value: &T, expires: i64) -> Result<bool>
    where
        Self: Sized,
        T: Serialize + ?Sized,
    {
        self.set_raw(key, &serde_json::to_string(value)?, expires)
    }

    fn get<T>(&mut self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
        T: DeserializeOwned,
    {
        decode(self.get_raw(key)?)
    }

    fn remove(&mut self, key: &str) -> Result<bool>;

    /// Drop every entry
    fn flush(&mut self) -> Result<bool>;

    fn close(&mut self);
}

/// Typed access for backends picked at runtime
impl dyn Storage {
    pub fn set<T>(&mut self, key: &str, value: &T, expires: i64) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        self.set_raw(key, &serde_json::to_string(value)?, expires)
    }

    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        decode(self.get_raw(key)?)
    }
}

fn decode<T: DeserializeOwned>(raw: Option<String>) -> Result<Option<T>> {
    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

/// [`Storage`] backed by the `cache` table of a database.
///
/// With an encrypter attached, `cData` holds ciphertext and reads that do not
/// decrypt under the key fail with [`Error::Crypt`].
#[derive(Debug)]
pub struct DatabaseStorage {
    db: Database,
    replace: Option<UpdateQuery>,
    select: Option<SelectQuery>,
    cipher: Option<(Arc<dyn Encrypter>, String)>,
}

impl DatabaseStorage {
    /// Use `db`, creating the `cache` table when it is missing
    pub fn new(db: Database) -> Result<Self> {
        if !db.is_connected() {
            return Err(Error::config(format!(
                "Could not connect to the cache database: {}",
                db.connect_error().unwrap_or_default()
            )));
        }

        db.execute(CREATE_TABLE, "", &[])?;
        if let Some(error) = db.query_error() {
            return Err(Error::config(format!(
                "Could not create the cache table: {}",
                error
            )));
        }

        Ok(Self {
            db,
            replace: None,
            select: None,
            cipher: None,
        })
    }

    /// Encrypt stored values with `encrypter` under `key`
    pub fn with_encrypter(mut self, encrypter: Arc<dyn Encrypter>, key: impl Into<String>) -> Self {
        self.cipher = Some((encrypter, key.into()));
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn open(protocol: &str, registry: &DriverRegistry) -> Result<Self> {
        Self::new(registry.open(protocol)?)
    }

    /// Open the `CACHE` protocol, or `DATABASE` when no cache is configured
    pub fn from_settings(settings: &Settings, registry: &DriverRegistry) -> Result<Self> {
        Self::open(settings.cache_protocol()?, registry)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Delete entries whose lifetime has run out
    pub fn purge_expired(&mut self) -> Result<u64> {
        let purged = self.db.execute(
            "DELETE FROM cache WHERE cExpires < ? AND cExpires > ?",
            "ii",
            &[Value::I64(unix_now()), Value::I64(0)],
        )?;
        if purged > 0 {
            info!(purged, "purged expired cache entries");
        }
        Ok(purged)
    }

    fn replace_entry(&mut self, key: &str, value: &str, expires: i64) -> Result<u64> {
        let db = &self.db;
        let replace = self.replace.get_or_insert_with(|| {
            let mut query = db
                .update("cache")
                .ignore()
                .add_segment_ids(["expires", "data", "key"])
                .field("cExpires", 'i', Value::Null)
                .field("cData", 's', Value::Null)
                .cond("cKey", 's', Value::Null);
            query.compile();
            query
        });

        let affected = replace
            .set_segment_input("key", [key])
            .set_segment_input("data", [value])
            .set_segment_input("expires", [expires])
            .execute()?;
        if affected > 0 {
            return Ok(affected);
        }

        debug!(key, "new cache key");
        Ok(self
            .db
            .insert("cache")
            .field("cKey", 's', key)
            .field("cData", 's', value)
            .field("cExpires", 'i', expires)
            .execute()?)
    }

    fn select_entry(&mut self, key: &str) -> Result<Option<Box<dyn QueryResult>>> {
        let db = &self.db;
        let select = self.select.get_or_insert_with(|| {
            let live = db
                .condition("or")
                .add_segment_ids(["never", "now"])
                .cond("cExpires", 'i', 0)
                .cond_op("cExpires", ">", 'i', Value::Null);
            let mut query = db
                .select("cache")
                .field("cData")
                .add_segment_ids(["key"])
                .cond("cKey", 's', Value::Null)
                .cond_group(live);
            query.compile();
            query
        });

        Ok(select
            .set_segment_input("key", [key])
            .set_segment_input("now", [unix_now()])
            .enquire()?)
    }
}

impl Storage for DatabaseStorage {
    fn set_raw(&mut self, key: &str, value: &str, expires: i64) -> Result<bool> {
        let expires = if expires > 0 {
            unix_now() + expires
        } else {
            expires
        };
        let sealed;
        let value = match &self.cipher {
            Some((encrypter, secret)) => {
                sealed = encrypter.encrypt(value, secret)?;
                sealed.as_str()
            }
            None => value,
        };
        Ok(self.replace_entry(key, value, expires)? > 0)
    }

    fn get_raw(&mut self, key: &str) -> Result<Option<String>> {
        let row = match self.select_entry(key)? {
            Some(mut result) => result.fetch(true),
            None => None,
        };
        let data = row
            .and_then(|values| values.into_iter().next())
            .and_then(|data| data.as_text());
        match (data, &self.cipher) {
            (Some(data), Some((encrypter, secret))) => {
                Ok(Some(encrypter.decrypt(&data, secret)?))
            }
            (data, _) => Ok(data),
        }
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        self.db
            .execute("DELETE FROM cache WHERE cKey = ?", "s", &[Value::from(key)])?;
        Ok(true)
    }

    fn flush(&mut self) -> Result<bool> {
        self.db.execute("DELETE FROM cache", "", &[])?;
        Ok(true)
    }

    fn close(&mut self) {
        self.replace = None;
        self.select = None;
        self.db.close();
    }
}

/// Opens a cache backend from a protocol
pub type StorageFactory = fn(&str, &DriverRegistry) -> Result<Box<dyn Storage>>;

fn open_database_storage(protocol: &str, drivers: &DriverRegistry) -> Result<Box<dyn Storage>> {
    Ok(Box::new(DatabaseStorage::open(protocol, drivers)?))
}

/// Maps cache backend names to factories
#[derive(Debug, Clone, Default)]
pub struct StorageRegistry {
    backends: HashMap<String, StorageFactory>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the `database` backend
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_CACHE_DRIVER, open_database_storage);
        registry
    }

    pub fn register(&mut self, name: &str, factory: StorageFactory) -> Option<StorageFactory> {
        self.backends.insert(name.to_string(), factory)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    pub fn open(
        &self,
        name: &str,
        protocol: &str,
        drivers: &DriverRegistry,
    ) -> Result<Box<dyn Storage>> {
        let factory = self
            .backends
            .get(name)
            .ok_or_else(|| Error::unknown_driver(name))?;
        info!(backend = name, "opening cache");
        factory(protocol, drivers)
    }

    /// Open the backend named by `CACHE_DRIVER` on the cache protocol
    pub fn from_settings(
        &self,
        settings: &Settings,
        drivers: &DriverRegistry,
    ) -> Result<Box<dyn Storage>> {
        let name = settings.cache_driver();
        if !self.contains(name) {
            return Err(Error::unknown_driver(name));
        }
        self.open(name, settings.cache_protocol()?, drivers)
    }
}
