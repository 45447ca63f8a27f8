//! Error types for the persistence layer
//!
//! This module defines all error types that can occur during database operations.

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DbError>;

/// Error types for database operations
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Initial connect failed or the connection dropped mid-operation
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// A returned row or live table shape does not match the resolved field set
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// No registered conversion between a wire value and a field type
    #[error("Cannot convert from {actual} to {expected}")]
    TypeCoercion { expected: String, actual: String },

    /// Invalid declarative metadata or a malformed raw SQL invocation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No free identifier found within the probe cap
    #[error("Cannot generate unique id in {tries} tries")]
    UniqueIdExhausted { tries: u32 },

    /// A command bound to a foreign connection handle
    #[error("Unauthorized SQL command, bad connection")]
    Unauthorized,

    /// SQLite driver error
    #[error("Driver error: {0}")]
    Driver(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Create a new connection failure error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DbError::ConnectionFailure(msg.into())
    }

    /// Create a new schema mismatch error
    pub fn schema_mismatch<S: Into<String>>(msg: S) -> Self {
        DbError::SchemaMismatch(msg.into())
    }

    /// Create a new type coercion error naming both types
    pub fn type_coercion(expected: &str, actual: &str) -> Self {
        DbError::TypeCoercion {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        DbError::Configuration(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DbError::Other(msg.into())
    }
}
