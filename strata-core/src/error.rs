//! Error types for strata-core

use thiserror::Error;

/// The main error type for query building and binding
#[derive(Error, Debug)]
pub enum Error {
    /// Bound values do not line up with their type tags, or a sub-query
    /// template is malformed
    #[error("Argument error: {message}")]
    Argument { message: String },

    /// A call was made while no live connection exists
    #[error("Attempt to make {action} on dead resource")]
    DeadResource { action: &'static str },

    /// A type tag outside of `s`, `i`, `f` and `b` reached the binding stage
    #[error("Cannot bind unknown param '{tag}'")]
    UnknownParam { tag: char },

    /// The driver reported a failed query where a result was required
    #[error("Query failed ({code}): {message}")]
    Query { code: i32, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience Result type for strata-core operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new argument error
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    /// Create a new dead resource error for a `call` or a `query`
    pub fn dead_resource(action: &'static str) -> Self {
        Self::DeadResource { action }
    }

    /// Create a new unknown param error
    pub fn unknown_param(tag: char) -> Self {
        Self::UnknownParam { tag }
    }

    /// Create a new query error from a driver error pair
    pub fn query(code: i32, message: impl Into<String>) -> Self {
        Self::Query {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_error() {
        let err = Error::argument("types/input mismatch");
        assert!(matches!(err, Error::Argument { .. }));
        assert_eq!(err.to_string(), "Argument error: types/input mismatch");
    }

    #[test]
    fn test_dead_resource_error() {
        let err = Error::dead_resource("query");
        assert_eq!(err.to_string(), "Attempt to make query on dead resource");

        let err = Error::dead_resource("call");
        assert_eq!(err.to_string(), "Attempt to make call on dead resource");
    }

    #[test]
    fn test_unknown_param_error() {
        let err = Error::unknown_param('x');
        assert!(matches!(err, Error::UnknownParam { tag: 'x' }));
        assert_eq!(err.to_string(), "Cannot bind unknown param 'x'");
    }

    #[test]
    fn test_query_error() {
        let err = Error::query(1, "no such table: users");
        assert_eq!(err.to_string(), "Query failed (1): no such table: users");
    }
}
