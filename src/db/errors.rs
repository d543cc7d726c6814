//! # Database Errors
//!
//! Failures reported by a [`DbClient`](super::DbClient), carrying the
//! engine's native code so it can be mapped to an HTTP status later.

use thiserror::Error;

/// Result type for driver operations
pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DbError {
    /// PostgreSQL error with its SQLSTATE
    #[error("{message}")]
    Postgres {
        code: String,
        message: String,
        detail: Option<String>,
        hint: Option<String>,
    },

    /// SQLite error with its symbolic result code (`SQLITE_BUSY`, ...)
    #[error("{message}")]
    Sqlite { code: String, message: String },

    /// MySQL server or client error number
    #[error("{message}")]
    MySql { code: u16, message: String },

    /// Driver failure without a native code
    #[error("Database driver error: {0}")]
    Driver(String),
}

impl DbError {
    pub fn postgres(code: impl Into<String>, message: impl Into<String>) -> Self {
        DbError::Postgres {
            code: code.into(),
            message: message.into(),
            detail: None,
            hint: None,
        }
    }

    pub fn sqlite(code: impl Into<String>, message: impl Into<String>) -> Self {
        DbError::Sqlite {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn mysql(code: u16, message: impl Into<String>) -> Self {
        DbError::MySql {
            code,
            message: message.into(),
        }
    }

    /// Native code as text, if the engine reported one
    pub fn code(&self) -> Option<String> {
        match self {
            DbError::Postgres { code, .. } => Some(code.clone()),
            DbError::Sqlite { code, .. } => Some(code.clone()),
            DbError::MySql { code, .. } => Some(code.to_string()),
            DbError::Driver(_) => None,
        }
    }

    /// Extra context to surface as the error description
    pub fn details(&self) -> Option<String> {
        match self {
            DbError::Postgres { detail, hint, .. } => match (detail, hint) {
                (Some(d), Some(h)) => Some(format!("{} {}", d, h)),
                (Some(d), None) => Some(d.clone()),
                (None, Some(h)) => Some(h.clone()),
                (None, None) => None,
            },
            _ => None,
        }
    }
}
