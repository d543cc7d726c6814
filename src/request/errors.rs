//! # Request Errors
//!
//! Failures while turning a host request into canonical form.

use thiserror::Error;

/// Result type for request normalization
pub type RequestResult<T> = Result<T, RequestError>;

#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// Reading the body failed part way; not retried
    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    /// Body bytes are not valid UTF-8
    #[error("Request body is not valid UTF-8")]
    InvalidUtf8,

    /// Query string could not be decoded
    #[error("Invalid query string: {0}")]
    InvalidQuery(String),

    /// URL could not be parsed
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl RequestError {
    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            RequestError::BodyRead(_) => 500,
            _ => 400,
        }
    }
}
