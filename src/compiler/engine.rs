//! Boundary to the statement-compilation engine.
//!
//! Request grammar parsing and SQL generation live in an external engine.
//! This module only fixes the contract this crate relies on.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::Env;
use crate::db::Dialect;
use crate::schema::Schema;

use super::Statement;

/// Opaque engine failure.
///
/// The message is frequently itself a JSON `{message, status, description}`
/// envelope; [`crate::api::ApiError::from_engine_message`] unpacks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EngineError {}

/// Inputs shared by both compile operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileRequest {
    pub schema_name: String,
    /// Target entity: URL path without the configured prefix
    pub entity: String,
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: String,
    pub role: String,
    pub headers: HashMap<String, String>,
    pub env: Env,
    pub max_rows: Option<u32>,
}

/// Engine entry point, bound once per schema
pub trait StatementEngine: Send + Sync {
    /// Validate `schema` and produce a compiler for it.
    ///
    /// Malformed schema or permission definitions fail here.
    fn init(
        &self,
        schema: &Schema,
        dialect: Dialect,
        allowed_select_functions: Option<&[String]>,
    ) -> Result<Box<dyn StatementCompiler>, EngineError>;
}

/// A compiler bound to one schema and dialect
pub trait StatementCompiler: Send + Sync {
    /// Statement whose single result row is a `DbResponseRow`
    fn compile_main(&self, request: &CompileRequest) -> Result<Statement, EngineError>;

    /// `(mutate, select_template)` for the two-phase protocol
    fn compile_two_phase(&self, request: &CompileRequest) -> Result<(Statement, Statement), EngineError>;
}
