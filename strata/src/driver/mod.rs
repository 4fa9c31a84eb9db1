//! Database drivers

#[cfg(feature = "sqlite")]
pub mod sqlite;
