//! # REST API Module
//!
//! Request handling on top of the protocol pieces: the gateway, the
//! per-dialect executor and an optional Axum router.

pub mod executor;
pub mod handler;
pub mod server;

pub use executor::Execution;
pub use handler::{build_env, entity_for, RestGateway, SINGULAR_MEDIA_TYPE};
pub use server::{RestServer, PERMISSIONS_ROUTE, SCHEMA_ROUTE};
