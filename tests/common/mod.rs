//! Shared test doubles: a scripted database client and a fixed-output
//! statement engine.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use restgate::compiler::{
    CompileRequest, EngineError, Param, Statement, StatementCompiler, StatementEngine,
};
use restgate::context::ContextStore;
use restgate::db::{DbClient, DbFuture, DbResult, Dialect, ExecOutcome, Row, TxMode};
use restgate::mutation::IDS_PLACEHOLDER;
use restgate::schema::Schema;
use serde_json::{json, Value};

// =============================================================================
// Scripted Client
// =============================================================================

/// Every call the client received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Begin(TxMode),
    Run(Statement),
    GetOne(Statement),
    GetAll(Statement),
    Commit,
    Rollback,
}

/// Answers from queues; an empty queue yields an empty success.
///
/// For SQLite it also owns a context store and records the role the store
/// held whenever a statement ran.
pub struct ScriptedClient {
    dialect: Dialect,
    calls: Mutex<Vec<Call>>,
    run_results: Mutex<VecDeque<DbResult<ExecOutcome>>>,
    one_results: Mutex<VecDeque<DbResult<Option<Row>>>>,
    all_results: Mutex<VecDeque<DbResult<Vec<Row>>>>,
    context: Option<ContextStore>,
    seen_roles: Mutex<Vec<Option<String>>>,
}

impl ScriptedClient {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            calls: Mutex::new(Vec::new()),
            run_results: Mutex::new(VecDeque::new()),
            one_results: Mutex::new(VecDeque::new()),
            all_results: Mutex::new(VecDeque::new()),
            context: (dialect == Dialect::Sqlite).then(ContextStore::new),
            seen_roles: Mutex::new(Vec::new()),
        }
    }

    pub fn push_run(&self, result: DbResult<ExecOutcome>) -> &Self {
        self.run_results.lock().unwrap().push_back(result);
        self
    }

    pub fn push_one(&self, result: DbResult<Option<Row>>) -> &Self {
        self.one_results.lock().unwrap().push_back(result);
        self
    }

    pub fn push_all(&self, result: DbResult<Vec<Row>>) -> &Self {
        self.all_results.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Role visible in the context store at each statement
    pub fn seen_roles(&self) -> Vec<Option<String>> {
        self.seen_roles.lock().unwrap().clone()
    }

    pub fn store(&self) -> Option<&ContextStore> {
        self.context.as_ref()
    }

    fn record(&self, call: Call) {
        if let Some(store) = &self.context {
            if matches!(call, Call::Run(_) | Call::GetOne(_) | Call::GetAll(_)) {
                self.seen_roles.lock().unwrap().push(store.get("role"));
            }
        }
        self.calls.lock().unwrap().push(call);
    }
}

impl DbClient for ScriptedClient {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn begin<'a>(&'a self, mode: TxMode) -> DbFuture<'a, ()> {
        self.record(Call::Begin(mode));
        Box::pin(async { Ok(()) })
    }

    fn run<'a>(&'a self, stmt: &'a Statement) -> DbFuture<'a, ExecOutcome> {
        self.record(Call::Run(stmt.clone()));
        let result = self
            .run_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ExecOutcome::default()));
        Box::pin(async move { result })
    }

    fn get_one<'a>(&'a self, stmt: &'a Statement) -> DbFuture<'a, Option<Row>> {
        self.record(Call::GetOne(stmt.clone()));
        let result = self.one_results.lock().unwrap().pop_front().unwrap_or(Ok(None));
        Box::pin(async move { result })
    }

    fn get_all<'a>(&'a self, stmt: &'a Statement) -> DbFuture<'a, Vec<Row>> {
        self.record(Call::GetAll(stmt.clone()));
        let result = self
            .all_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Vec::new()));
        Box::pin(async move { result })
    }

    fn commit<'a>(&'a self) -> DbFuture<'a, ()> {
        self.record(Call::Commit);
        Box::pin(async { Ok(()) })
    }

    fn rollback<'a>(&'a self) -> DbFuture<'a, ()> {
        self.record(Call::Rollback);
        Box::pin(async { Ok(()) })
    }

    fn context_store(&self) -> Option<&ContextStore> {
        self.context.as_ref()
    }
}

// =============================================================================
// Fixed Engine
// =============================================================================

/// Engine that hands back the same statements for every request and
/// remembers the last request it compiled
#[derive(Clone)]
pub struct FixedEngine {
    pub main: Statement,
    pub mutate: Statement,
    pub select: Statement,
    pub init_error: Option<String>,
    pub last_request: Arc<Mutex<Option<CompileRequest>>>,
}

impl FixedEngine {
    pub fn new() -> Self {
        Self {
            main: Statement::new("select main", vec![Param::from("p1")]),
            mutate: Statement::new("mutate", vec![Param::from("m1")]),
            select: Statement::new(
                "select representation",
                vec![Param::from("s1"), Param::from(IDS_PLACEHOLDER), Param::from(7i64)],
            ),
            init_error: None,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_statements(main: Statement, mutate: Statement, select: Statement) -> Self {
        Self {
            main,
            mutate,
            select,
            ..Self::new()
        }
    }

    pub fn last_request(&self) -> Option<CompileRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

impl StatementEngine for FixedEngine {
    fn init(
        &self,
        _schema: &Schema,
        _dialect: Dialect,
        _allowed_select_functions: Option<&[String]>,
    ) -> Result<Box<dyn StatementCompiler>, EngineError> {
        match &self.init_error {
            Some(message) => Err(EngineError::new(message.clone())),
            None => Ok(Box::new(self.clone())),
        }
    }
}

impl StatementCompiler for FixedEngine {
    fn compile_main(&self, request: &CompileRequest) -> Result<Statement, EngineError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self.main.clone())
    }

    fn compile_two_phase(&self, request: &CompileRequest) -> Result<(Statement, Statement), EngineError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok((self.mutate.clone(), self.select.clone()))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// `items` readable by everyone; `alice` writes under a row check
pub fn items_schema() -> Schema {
    Schema::from_value(json!({
        "schemas": [{
            "name": "public",
            "objects": [{
                "name": "items",
                "kind": "table",
                "columns": [
                    {"name": "id", "data_type": "INTEGER", "primary_key": true},
                    {"name": "name", "data_type": "TEXT"}
                ],
                "foreign_keys": [],
                "permissions": [
                    {"role": "public", "grant": ["select"]},
                    {"role": "alice", "grant": ["insert", "update", "delete"]},
                    {"role": "alice", "policy_for": ["insert", "update"], "check": {"column": "name", "op": "neq", "val": "forbidden"}}
                ]
            }]
        }]
    }))
    .unwrap()
}

/// A result row as compiled statements return it
pub fn response_row(body: &str, page_total: i64) -> Row {
    Row::new()
        .with("body", Value::from(body))
        .with("page_total", Value::from(page_total))
        .with("total_result_set", Value::Null)
        .with("constraints_satisfied", Value::Null)
        .with("response_headers", Value::Null)
        .with("response_status", Value::Null)
}
