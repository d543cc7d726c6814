//! Schema model and bootstrap
//!
//! The schema is introspected once at startup, validated, and then shared
//! read-only. Replacing it means building a new compiler instance.

mod errors;
mod introspection;
mod loader;
mod types;
mod views;

pub use errors::{SchemaError, SchemaResult};
pub use introspection::{
    introspection_query, raw_introspection_query, splice_markers, PERMISSIONS_FILE, RELATIONS_FILE,
};
pub use loader::{load_schema, RetryPolicy, JSON_SCHEMA_COLUMN};
pub use types::{
    Action, DbSchema, Grant, ObjectKind, Permission, Policy, Schema, SchemaColumn,
    SchemaForeignKey, SchemaObject, PUBLIC_ROLE,
};
pub use views::{permissions_view, schema_view, ui_actions, ObjectView, PermissionView};
