//! Error types for Strata

use thiserror::Error;

/// The main error type for Strata operations
#[derive(Error, Debug)]
pub enum Error {
    /// Error raised by the query builders or the connection contract
    #[error(transparent)]
    Core(#[from] strata_core::Error),

    /// Database connection or execution error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No driver is registered under this name
    #[error("Unknown database driver '{name}'")]
    UnknownDriver { name: String },

    /// A protocol string that is not `<driver>://<target>`
    #[error("Invalid database protocol '{protocol}'")]
    InvalidProtocol { protocol: String },

    /// Encryption failed, or decrypted data did not verify
    #[error("Crypt error: {message}")]
    Crypt { message: String },

    /// Missing or malformed settings
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience Result type for Strata operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn unknown_driver(name: impl Into<String>) -> Self {
        Self::UnknownDriver { name: name.into() }
    }

    pub fn invalid_protocol(protocol: impl Into<String>) -> Self {
        Self::InvalidProtocol {
            protocol: protocol.into(),
        }
    }

    pub fn crypt(message: impl Into<String>) -> Self {
        Self::Crypt {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_is_transparent() {
        let err: Error = strata_core::Error::dead_resource("call").into();
        assert_eq!(err.to_string(), "Attempt to make call on dead resource");
        assert!(matches!(
            err,
            Error::Core(strata_core::Error::DeadResource { .. })
        ));
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::unknown_driver("oracle").to_string(),
            "Unknown database driver 'oracle'"
        );
        assert_eq!(
            Error::invalid_protocol("nowhere").to_string(),
            "Invalid database protocol 'nowhere'"
        );
        assert_eq!(
            Error::config("DATABASE is not set").to_string(),
            "Configuration error: DATABASE is not set"
        );
        assert_eq!(
            Error::crypt("Verification failed").to_string(),
            "Crypt error: Verification failed"
        );
    }
}
