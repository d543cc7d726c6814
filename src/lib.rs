//! restgate - REST to SQL protocol layer
//!
//! Turns REST requests into parameterized SQL for PostgreSQL, SQLite and
//! MySQL. Grammar parsing and SQL generation belong to an external
//! statement engine; this crate handles everything around it:
//!
//! - request normalization across host request shapes
//! - request context exposed to SQL per dialect
//! - the two-phase mutate-then-select protocol and its permission gate
//! - error translation to HTTP statuses
//! - the schema introspection bootstrap

pub mod api;
pub mod auth;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod context;
pub mod db;
pub mod mutation;
pub mod observability;
pub mod request;
pub mod rest_api;
pub mod schema;
