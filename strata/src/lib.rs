//! Strata - segment-based SQL query builders with drivers and a database cache
//!
//! This crate re-exports the builders from `strata-core` and adds what is
//! needed to run them: a driver registry keyed by protocol name, the SQLite
//! driver, a lazily opened default connection and a cache stored in a
//! database table, optionally encrypted.
//!
//! ```no_run
//! use strata::prelude::*;
//! use strata::{DefaultConnection, Settings};
//!
//! # fn main() -> strata::Result<()> {
//! let db = DefaultConnection::new(Settings::from_env());
//! let mut query = db
//!     .select("users")?
//!     .fields(["id", "name"])
//!     .cond_op("age", op::GT, 'i', 18);
//! if let Some(mut rows) = query.enquire()? {
//!     while let Some(row) = rows.fetch_assoc(false) {
//!         println!("{:?}", row);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod crypt;
pub mod driver;
pub mod error;
pub mod manager;
pub mod registry;

pub use cache::{DatabaseStorage, Storage, StorageFactory, StorageRegistry};
pub use config::Settings;
pub use crypt::{Blake3Encrypter, Encrypter, EncrypterFactory, EncrypterRegistry};
pub use error::{Error, Result};
pub use manager::DefaultConnection;
pub use registry::{split_protocol, DriverFactory, DriverRegistry};

#[cfg(feature = "sqlite")]
pub use driver::sqlite::SqliteConnection;

// Re-export the builder layer
pub use strata_core::{
    escape_value, op, typed_params, BufferedResult, Compiled, ConditionQuery, Connection,
    Database, DeleteQuery, Enquirable, Executable, IdAllocator, InsertQuery, IntoColumns,
    IntoOperator, JoinType, Operator, QueryBuilder, QueryResult, QuoteStyle, Row, SegmentId,
    SelectQuery, TypeTag, UpdateQuery, Value, WhereConnector,
};

/// Builder traits, the connection handles and the cache trait
pub mod prelude {
    pub use crate::cache::Storage;
    pub use crate::crypt::Encrypter;
    pub use crate::manager::DefaultConnection;
    pub use strata_core::prelude::*;
    pub use strata_core::QueryResult;
}
