//! # API Errors
//!
//! The single error type that leaves the crate. Every subsystem error
//! converts into [`ApiError`], which renders as
//! `{message, status, description?}`.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::AuthError;
use crate::compiler::EngineError;
use crate::db::DbError;
use crate::mutation::MutationError;
use crate::request::RequestError;
use crate::schema::SchemaError;

use super::translate::status_for_db_error;

/// Result type for request handling
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    // ==================
    // Domain Errors
    // ==================
    /// Requested schema is not one of the exposed schemas
    #[error("Schema '{schema}' not found")]
    SchemaNotFound { schema: String, allowed: Vec<String> },

    /// HTTP method has no REST meaning here
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    /// Schema is not loaded yet
    #[error("Temporary unavailable")]
    Unavailable,

    /// PUT touched something other than exactly one row
    #[error("Payload values do not match URL in primary key column(s)")]
    PutMatchingPk,

    /// Singular object requested but the result is not one row
    #[error("JSON object requested, multiple (or no) rows returned")]
    Singularity { count: i64 },

    /// `response_headers` column is not an object or list of objects
    #[error("response.headers guc must be a JSON array composed of objects with a single key and a string value")]
    ResponseHeaders,

    // ==================
    // Engine Errors
    // ==================
    /// Structured failure from the statement compiler
    #[error("{message}")]
    Engine {
        message: String,
        status: u16,
        description: Option<String>,
    },

    // ==================
    // Database Errors
    // ==================
    /// Native driver error, classified by its code
    #[error("{source}")]
    Database { source: DbError, authenticated: bool },

    // ==================
    // Pass-through
    // ==================
    #[error("{0}")]
    Request(#[from] RequestError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    Mutation(#[from] MutationError),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire shape of every error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub message: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Envelope the engine encodes into its error text
#[derive(Deserialize)]
struct EngineEnvelope {
    message: String,
    status: u16,
    #[serde(default)]
    description: Option<String>,
}

impl ApiError {
    /// Unpack an engine message that may itself be a JSON envelope.
    ///
    /// Anything that does not parse becomes a 500 carrying the raw text.
    pub fn from_engine_message(raw: &str) -> Self {
        match serde_json::from_str::<EngineEnvelope>(raw) {
            Ok(env) => ApiError::Engine {
                message: env.message,
                status: env.status,
                description: env.description,
            },
            Err(_) => ApiError::Engine {
                message: raw.to_string(),
                status: 500,
                description: None,
            },
        }
    }

    pub fn database(source: DbError, authenticated: bool) -> Self {
        ApiError::Database {
            source,
            authenticated,
        }
    }

    /// Numeric status before conversion to [`StatusCode`]
    pub fn status(&self) -> u16 {
        match self {
            ApiError::SchemaNotFound { .. } => 406,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::Unavailable => 503,
            ApiError::PutMatchingPk => 400,
            ApiError::Singularity { .. } => 406,
            ApiError::ResponseHeaders => 500,
            ApiError::Engine { status, .. } => *status,
            ApiError::Database {
                source,
                authenticated,
            } => status_for_db_error(source, *authenticated),
            ApiError::Request(e) => e.status_code(),
            ApiError::Auth(e) => e.status_code(),
            ApiError::Schema(e) => e.status_code(),
            ApiError::Mutation(e) => e.status_code(),
            ApiError::Internal(_) => 500,
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn description(&self) -> Option<String> {
        match self {
            ApiError::SchemaNotFound { allowed, .. } => Some(format!(
                "Only the following schemas are allowed: {}",
                allowed.join(", ")
            )),
            ApiError::Singularity { count } => {
                Some(format!("Results contain {} rows, application/vnd.pgrst.object+json requires 1 row", count))
            }
            ApiError::Engine { description, .. } => description.clone(),
            ApiError::Database { source, .. } => source.details(),
            ApiError::Mutation(e) => e.description().map(str::to_string),
            _ => None,
        }
    }

    /// Caller bugs; never retried
    pub fn is_fatal(&self) -> bool {
        match self {
            ApiError::Mutation(e) => e.is_fatal(),
            ApiError::Internal(_) => true,
            _ => false,
        }
    }

    pub fn shape(&self) -> ErrorShape {
        let (detail, hint) = match self {
            ApiError::Database {
                source: DbError::Postgres { detail, hint, .. },
                ..
            } => (detail.clone(), hint.clone()),
            _ => (None, None),
        };
        let description = match self {
            // postgres keeps detail and hint as separate fields
            ApiError::Database {
                source: DbError::Postgres { .. },
                ..
            } => None,
            _ => self.description(),
        };
        ErrorShape {
            message: self.to_string(),
            status: self.status(),
            description,
            detail,
            hint,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::from_engine_message(err.message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let challenge = match &self {
            ApiError::Auth(e) => Some(e.www_authenticate()),
            _ => None,
        };
        let body = Json(self.shape());
        match challenge {
            Some(value) => (status, [(header::WWW_AUTHENTICATE, value)], body).into_response(),
            None => (status, body).into_response(),
        }
    }
}
