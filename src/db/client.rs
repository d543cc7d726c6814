//! Driver adapter shared by all dialects.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::MutexGuard;

use crate::compiler::Statement;
use crate::context::ContextStore;

use super::{DbResult, Dialect, Row};

/// Boxed future returned by [`DbClient`] methods
pub type DbFuture<'a, T> = Pin<Box<dyn Future<Output = DbResult<T>> + Send + 'a>>;

/// Exclusive use of a connection for one request.
///
/// Held from the moment the request context is set until its transaction
/// ends. Clients whose connection is never shared hand out an empty guard.
#[must_use = "the connection is released as soon as the guard is dropped"]
pub struct SessionGuard<'a> {
    lock: Option<MutexGuard<'a, ()>>,
}

impl<'a> SessionGuard<'a> {
    /// Guard for a client that needs no serialization
    pub fn unshared() -> Self {
        Self { lock: None }
    }

    pub fn exclusive(lock: MutexGuard<'a, ()>) -> Self {
        Self { lock: Some(lock) }
    }

    pub fn is_exclusive(&self) -> bool {
        self.lock.is_some()
    }
}

impl std::fmt::Debug for SessionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("exclusive", &self.is_exclusive())
            .finish()
    }
}

/// Transaction access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

impl TxMode {
    pub fn for_read_only(read_only: bool) -> Self {
        if read_only {
            TxMode::ReadOnly
        } else {
            TxMode::ReadWrite
        }
    }

    /// Statement opening a transaction in this mode
    pub fn begin_sql(&self, dialect: Dialect) -> &'static str {
        match (dialect, self) {
            (Dialect::Postgresql, TxMode::ReadOnly) => "BEGIN ISOLATION LEVEL READ COMMITTED READ ONLY",
            (Dialect::Postgresql, TxMode::ReadWrite) => "BEGIN ISOLATION LEVEL READ COMMITTED READ WRITE",
            (Dialect::Mysql, TxMode::ReadOnly) => "START TRANSACTION READ ONLY",
            (Dialect::Mysql, TxMode::ReadWrite) => "START TRANSACTION READ WRITE",
            (Dialect::Sqlite, TxMode::ReadOnly) => "BEGIN DEFERRED",
            (Dialect::Sqlite, TxMode::ReadWrite) => "BEGIN IMMEDIATE",
        }
    }
}

/// Outcome of a statement run for its side effects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub affected_rows: u64,
    /// Auto-generated id of the first inserted row, when the driver reports one
    pub last_insert_id: Option<i64>,
}

/// One database connection, whatever the engine.
///
/// The executor drives every dialect through these calls and never
/// branches on the concrete driver type.
pub trait DbClient: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Wait for exclusive use of the connection.
    ///
    /// A client backed by a connection shared between requests must make
    /// this wait for any other holder, or transactions and request context
    /// of concurrent requests interleave.
    fn session<'a>(&'a self) -> Pin<Box<dyn Future<Output = SessionGuard<'a>> + Send + 'a>> {
        Box::pin(std::future::ready(SessionGuard::unshared()))
    }

    fn begin<'a>(&'a self, mode: TxMode) -> DbFuture<'a, ()>;

    fn run<'a>(&'a self, stmt: &'a Statement) -> DbFuture<'a, ExecOutcome>;

    fn get_one<'a>(&'a self, stmt: &'a Statement) -> DbFuture<'a, Option<Row>>;

    fn get_all<'a>(&'a self, stmt: &'a Statement) -> DbFuture<'a, Vec<Row>>;

    fn commit<'a>(&'a self) -> DbFuture<'a, ()>;

    fn rollback<'a>(&'a self) -> DbFuture<'a, ()>;

    /// Context read by `env()`/`jwt()` on connections without session variables
    fn context_store(&self) -> Option<&ContextStore> {
        None
    }
}
