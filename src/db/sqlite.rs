//! Embedded SQLite client.
//!
//! SQLite has no session variables, so each client owns a
//! [`ContextStore`] and registers `env(key)` and `jwt()` on its connection
//! to read from it. The store is per connection, and a request holds the
//! connection's [`SessionGuard`] from setting its context until its
//! transaction ends, so concurrent requests on one client run one after
//! another.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, OpenFlags};
use serde_json::Value;

use crate::compiler::{Param, Scalar, Statement};
use crate::context::ContextStore;

use super::{DbClient, DbError, DbFuture, DbResult, Dialect, ExecOutcome, Row, SessionGuard, TxMode};

pub struct SqliteClient {
    connection: Mutex<Connection>,
    /// Held by one request at a time; the connection mutex only covers a statement
    request_lock: tokio::sync::Mutex<()>,
    context: ContextStore,
}

impl SqliteClient {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection = Connection::open_with_flags(path, flags).map_err(map_sqlite_error)?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        let connection = Connection::open_in_memory().map_err(map_sqlite_error)?;
        Self::from_connection(connection)
    }

    /// Wrap an existing connection, registering the context functions on it
    pub fn from_connection(connection: Connection) -> DbResult<Self> {
        let context = ContextStore::new();
        register_context_functions(&connection, &context)?;
        connection
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(map_sqlite_error)?;
        Ok(Self {
            connection: Mutex::new(connection),
            request_lock: tokio::sync::Mutex::new(()),
            context,
        })
    }

    /// Run raw SQL outside the statement protocol (setup, migrations)
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.lock()?.execute_batch(sql).map_err(map_sqlite_error)
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| DbError::Driver("sqlite connection mutex poisoned".to_string()))
    }

    fn exec(&self, stmt: &Statement) -> DbResult<ExecOutcome> {
        let conn = self.lock()?;
        let affected = conn
            .execute(&stmt.query, params_from_iter(bind_values(&stmt.parameters)))
            .map_err(map_sqlite_error)?;
        let last_insert_id = if affected > 0 {
            Some(conn.last_insert_rowid())
        } else {
            None
        };
        Ok(ExecOutcome {
            affected_rows: affected as u64,
            last_insert_id,
        })
    }

    fn query(&self, stmt: &Statement, limit: Option<usize>) -> DbResult<Vec<Row>> {
        let conn = self.lock()?;
        let mut prepared = conn.prepare(&stmt.query).map_err(map_sqlite_error)?;
        let names: Vec<String> = prepared
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut rows = prepared
            .query(params_from_iter(bind_values(&stmt.parameters)))
            .map_err(map_sqlite_error)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqlite_error)? {
            let mut converted = Row::new();
            for (i, name) in names.iter().enumerate() {
                let value = row.get_ref(i).map_err(map_sqlite_error)?;
                converted.push(name.clone(), value_to_json(value));
            }
            out.push(converted);
            if limit.is_some_and(|n| out.len() >= n) {
                break;
            }
        }
        Ok(out)
    }

    fn batch(&self, sql: &str) -> DbResult<()> {
        self.lock()?.execute_batch(sql).map_err(map_sqlite_error)
    }
}

impl DbClient for SqliteClient {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn session<'a>(&'a self) -> Pin<Box<dyn Future<Output = SessionGuard<'a>> + Send + 'a>> {
        Box::pin(async move { SessionGuard::exclusive(self.request_lock.lock().await) })
    }

    fn begin<'a>(&'a self, mode: TxMode) -> DbFuture<'a, ()> {
        let result = self.batch(mode.begin_sql(Dialect::Sqlite));
        Box::pin(std::future::ready(result))
    }

    fn run<'a>(&'a self, stmt: &'a Statement) -> DbFuture<'a, ExecOutcome> {
        Box::pin(std::future::ready(self.exec(stmt)))
    }

    fn get_one<'a>(&'a self, stmt: &'a Statement) -> DbFuture<'a, Option<Row>> {
        let result = self.query(stmt, Some(1)).map(|rows| rows.into_iter().next());
        Box::pin(std::future::ready(result))
    }

    fn get_all<'a>(&'a self, stmt: &'a Statement) -> DbFuture<'a, Vec<Row>> {
        Box::pin(std::future::ready(self.query(stmt, None)))
    }

    fn commit<'a>(&'a self) -> DbFuture<'a, ()> {
        Box::pin(std::future::ready(self.batch("COMMIT")))
    }

    fn rollback<'a>(&'a self) -> DbFuture<'a, ()> {
        Box::pin(std::future::ready(self.batch("ROLLBACK")))
    }

    fn context_store(&self) -> Option<&ContextStore> {
        Some(&self.context)
    }
}

fn register_context_functions(conn: &Connection, context: &ContextStore) -> DbResult<()> {
    let store = context.clone();
    conn.create_scalar_function("env", 1, FunctionFlags::SQLITE_UTF8, move |ctx| {
        let key: String = ctx.get(0)?;
        Ok(store.get(&key))
    })
    .map_err(map_sqlite_error)?;

    let store = context.clone();
    conn.create_scalar_function("jwt", 0, FunctionFlags::SQLITE_UTF8, move |_ctx| {
        Ok(store.jwt())
    })
    .map_err(map_sqlite_error)?;
    Ok(())
}

// SQLite has no array type; lists bind as JSON text for `json_each`.
fn bind_values(params: &[Param]) -> Vec<SqlValue> {
    params
        .iter()
        .map(|p| match p {
            Param::Scalar(s) => scalar_value(s),
            Param::List(_) => SqlValue::Text(p.to_json().to_string()),
        })
        .collect()
}

fn scalar_value(scalar: &Scalar) -> SqlValue {
    match scalar {
        Scalar::Null => SqlValue::Null,
        Scalar::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Scalar::Int(i) => SqlValue::Integer(*i),
        Scalar::Float(f) => SqlValue::Real(*f),
        Scalar::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

/// Convert a rusqlite error into a [`DbError`] carrying the symbolic code
pub fn map_sqlite_error(err: rusqlite::Error) -> DbError {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let code = symbolic_code(failure.code, failure.extended_code);
            let message = message.unwrap_or_else(|| failure.to_string());
            DbError::sqlite(code, message)
        }
        other => DbError::Driver(other.to_string()),
    }
}

fn symbolic_code(code: ErrorCode, extended: i32) -> &'static str {
    match code {
        ErrorCode::ConstraintViolation => match extended {
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => "SQLITE_CONSTRAINT_UNIQUE",
            rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => "SQLITE_CONSTRAINT_PRIMARYKEY",
            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => "SQLITE_CONSTRAINT_FOREIGNKEY",
            rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL => "SQLITE_CONSTRAINT_NOTNULL",
            rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => "SQLITE_CONSTRAINT_CHECK",
            _ => "SQLITE_CONSTRAINT",
        },
        ErrorCode::InternalMalfunction => "SQLITE_INTERNAL",
        ErrorCode::PermissionDenied => "SQLITE_PERM",
        ErrorCode::OperationAborted => "SQLITE_ABORT",
        ErrorCode::DatabaseBusy => "SQLITE_BUSY",
        ErrorCode::DatabaseLocked => "SQLITE_LOCKED",
        ErrorCode::OutOfMemory => "SQLITE_NOMEM",
        ErrorCode::ReadOnly => "SQLITE_READONLY",
        ErrorCode::OperationInterrupted => "SQLITE_INTERRUPT",
        ErrorCode::SystemIoFailure => "SQLITE_IOERR",
        ErrorCode::DatabaseCorrupt => "SQLITE_CORRUPT",
        ErrorCode::NotFound => "SQLITE_NOTFOUND",
        ErrorCode::DiskFull => "SQLITE_FULL",
        ErrorCode::CannotOpen => "SQLITE_CANTOPEN",
        ErrorCode::FileLockingProtocolFailed => "SQLITE_PROTOCOL",
        ErrorCode::SchemaChanged => "SQLITE_SCHEMA",
        ErrorCode::TooBig => "SQLITE_TOOBIG",
        ErrorCode::TypeMismatch => "SQLITE_MISMATCH",
        ErrorCode::ApiMisuse => "SQLITE_MISUSE",
        ErrorCode::NoLargeFileSupport => "SQLITE_NOLFS",
        ErrorCode::AuthorizationForStatementDenied => "SQLITE_AUTH",
        ErrorCode::ParameterOutOfRange => "SQLITE_RANGE",
        ErrorCode::NotADatabase => "SQLITE_NOTADB",
        _ => "SQLITE_ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Env;
    use serde_json::json;

    fn client() -> SqliteClient {
        let client = SqliteClient::open_in_memory().unwrap();
        client
            .execute_batch("create table items (id integer primary key, name text unique);")
            .unwrap();
        client
    }

    #[tokio::test]
    async fn test_get_all_returns_named_columns() {
        let client = client();
        client
            .run(&Statement::new(
                "insert into items (name) values (?), (?)",
                vec![Param::from("a"), Param::from("b")],
            ))
            .await
            .unwrap();
        let rows = client
            .get_all(&Statement::raw("select id, name from items order by id"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some(&json!("a")));
        assert_eq!(rows[1].first(), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_unique_violation_reports_extended_code() {
        let client = client();
        let insert = Statement::new("insert into items (name) values (?)", vec![Param::from("x")]);
        client.run(&insert).await.unwrap();
        let err = client.run(&insert).await.unwrap_err();
        assert_eq!(err.code().as_deref(), Some("SQLITE_CONSTRAINT_UNIQUE"));
    }

    #[tokio::test]
    async fn test_syntax_error_is_generic_error() {
        let client = client();
        let err = client.get_one(&Statement::raw("selec 1")).await.unwrap_err();
        assert_eq!(err.code().as_deref(), Some("SQLITE_ERROR"));
    }

    #[tokio::test]
    async fn test_env_functions_read_scoped_context() {
        let client = client();
        let store = client.context_store().unwrap().clone();
        let stmt = Statement::raw("select env('role') as role, jwt() as claims");
        {
            let _scope = store.enter(&Env::new().with("role", "alice").with("request.jwt.claims", "{\"sub\":1}"));
            let row = client.get_one(&stmt).await.unwrap().unwrap();
            assert_eq!(row.get("role"), Some(&json!("alice")));
            assert_eq!(row.get("claims"), Some(&json!("{\"sub\":1}")));
        }
        let row = client.get_one(&stmt).await.unwrap().unwrap();
        assert_eq!(row.get("role"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_list_params_bind_as_json_text() {
        let client = client();
        let stmt = Statement::new(
            "select count(*) as n from json_each(?)",
            vec![Param::List(vec![Scalar::Int(1), Scalar::Int(2)])],
        );
        let row = client.get_one(&stmt).await.unwrap().unwrap();
        assert_eq!(row.get("n"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_session_is_exclusive() {
        let client = client();
        let guard = client.session().await;
        assert!(guard.is_exclusive());
        assert!(client.request_lock.try_lock().is_err());
        drop(guard);
        assert!(client.request_lock.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let client = client();
        client.begin(TxMode::ReadWrite).await.unwrap();
        client
            .run(&Statement::new("insert into items (name) values (?)", vec![Param::from("z")]))
            .await
            .unwrap();
        client.rollback().await.unwrap();
        let row = client
            .get_one(&Statement::raw("select count(*) as n from items"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get("n"), Some(&json!(0)));
    }
}
