//! Database adapter layer.
//!
//! Every engine is driven through the [`DbClient`] trait, selected at
//! runtime by its [`Dialect`] tag.

mod client;
mod dialect;
mod errors;
mod row;
pub mod sqlite;

pub use client::{DbClient, DbFuture, ExecOutcome, SessionGuard, TxMode};
pub use dialect::Dialect;
pub use errors::{DbError, DbResult};
pub use row::{as_i64, truthy, Row};
pub use sqlite::SqliteClient;
