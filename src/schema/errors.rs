//! # Schema Errors
//!
//! Failures while bootstrapping or validating the introspected schema.

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// Introspection returned something that is not a schema document
    #[error("invalid json schema: {0}")]
    InvalidJson(String),

    /// Schema parsed but its permission or relation definitions are malformed
    #[error("invalid schema definition: {0}")]
    Invalid(String),

    /// Database unreachable or the introspection query failed
    #[error("failed to connect to database: {0}")]
    Connection(String),

    /// Introspection query returned no row
    #[error("introspection query returned no rows")]
    Empty,
}

impl SchemaError {
    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            SchemaError::Connection(_) => 503,
            _ => 500,
        }
    }

    /// Only connectivity failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchemaError::Connection(_))
    }
}
