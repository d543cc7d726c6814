//! # Auth Errors
//!
//! Error types for request authentication.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    // ==================
    // JWT Errors
    // ==================
    /// Token could not be decoded or its signature is wrong
    #[error("JWT invalid: {0}")]
    InvalidToken(String),

    /// Token has expired
    #[error("JWT expired")]
    TokenExpired,

    /// Authorization header is present but not a bearer token
    #[error("Authorization header is not a bearer token")]
    MalformedHeader,
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        401
    }

    /// Value for the `WWW-Authenticate` response header
    pub fn www_authenticate(&self) -> String {
        match self {
            AuthError::MalformedHeader => "Bearer".to_string(),
            _ => format!(
                "Bearer error=\"invalid_token\", error_description=\"{}\"",
                self.to_string().replace('"', "'")
            ),
        }
    }
}
