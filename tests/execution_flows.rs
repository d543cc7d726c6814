//! Execution Flow Tests
//!
//! Drives the gateway against a scripted client to check, per dialect:
//! - the order of transaction and statement calls
//! - rollback on every failure path
//! - the two-phase id handoff between mutate and select
//! - post-checks before commit

mod common;

use axum::http::Method;
use restgate::api::ApiError;
use restgate::auth::AuthContext;
use restgate::compiler::{CompilerInterface, Param};
use restgate::config::GatewayConfig;
use restgate::db::{DbError, Dialect, ExecOutcome, Row, TxMode};
use restgate::mutation::{CONSTRAINT_FLAG_COLUMN, SURVIVING_IDS_QUERY};
use restgate::request::{HostRequest, NormalizedRequest, RequestBody};
use restgate::rest_api::RestGateway;
use serde_json::{json, Value};

use common::{items_schema, response_row, Call, FixedEngine, ScriptedClient};

// =============================================================================
// Helper Functions
// =============================================================================

fn gateway_with(config: GatewayConfig, engine: &FixedEngine) -> RestGateway {
    let gateway = RestGateway::new(&config);
    let compiler = CompilerInterface::new(engine, items_schema(), config.dialect, None).unwrap();
    gateway.install(compiler);
    gateway
}

fn gateway(dialect: Dialect, engine: &FixedEngine) -> RestGateway {
    gateway_with(
        GatewayConfig {
            dialect,
            ..Default::default()
        },
        engine,
    )
}

async fn normalized(method: Method, url: &str, headers: &[(&str, &str)], body: &str) -> NormalizedRequest {
    let mut req = HostRequest::parse(method, url).unwrap();
    for (k, v) in headers {
        req = req.header(*k, *v);
    }
    req.body(RequestBody::text(body)).normalize().await.unwrap()
}

fn alice() -> AuthContext {
    AuthContext {
        role: "alice".to_string(),
        claims: Some(json!({"role": "alice", "sub": "1"})),
        authenticated: true,
    }
}

fn anonymous() -> AuthContext {
    AuthContext::anonymous("anonymous")
}

fn flagged(id: i64, flag: i64) -> Row {
    Row::new()
        .with("id", Value::from(id))
        .with(CONSTRAINT_FLAG_COLUMN, Value::from(flag))
}

fn ends_with_rollback(calls: &[Call]) -> bool {
    calls.last() == Some(&Call::Rollback) && !calls.contains(&Call::Commit)
}

// =============================================================================
// PostgreSQL Flow Tests
// =============================================================================

/// Reads run in a read-only transaction after the env statement.
#[tokio::test]
async fn test_postgresql_read_flow() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Postgresql, &engine);
    let client = ScriptedClient::new(Dialect::Postgresql);
    client.push_one(Ok(Some(response_row("[{\"id\":1}]", 1))));

    let req = normalized(Method::GET, "/items?select=id", &[], "").await;
    let response = gw.handle_normalized(&client, &req, &anonymous()).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "[{\"id\":1}]");
    assert_eq!(response.header("content-range"), Some("*/*"));

    let calls = client.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], Call::Begin(TxMode::ReadOnly));
    match &calls[1] {
        Call::Run(stmt) => assert!(stmt.query.starts_with("select set_config($1, $2, true)")),
        other => panic!("expected env statement, got {:?}", other),
    }
    assert_eq!(calls[2], Call::GetOne(engine.main.clone()));
    assert_eq!(calls[3], Call::Commit);
}

/// Without a wrapping transaction neither BEGIN nor the env statement is sent.
#[tokio::test]
async fn test_postgresql_without_transaction() {
    let engine = FixedEngine::new();
    let mut config = GatewayConfig::default();
    config.handler.wrap_in_transaction = false;
    let gw = gateway_with(config, &engine);
    let client = ScriptedClient::new(Dialect::Postgresql);
    client.push_one(Ok(Some(response_row("[]", 0))));

    let req = normalized(Method::GET, "/items", &[], "").await;
    gw.handle_normalized(&client, &req, &anonymous()).await.unwrap();

    assert_eq!(client.calls(), vec![Call::GetOne(engine.main.clone())]);
}

/// A failed in-statement permission check rolls back with 403.
#[tokio::test]
async fn test_postgresql_constraint_failure_rolls_back() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Postgresql, &engine);
    let client = ScriptedClient::new(Dialect::Postgresql);
    let row = Row::new()
        .with("body", json!("[]"))
        .with("page_total", json!(1))
        .with("constraints_satisfied", json!(false));
    client.push_one(Ok(Some(row)));

    let req = normalized(Method::POST, "/items", &[], r#"{"name":"x"}"#).await;
    let err = gw.handle_normalized(&client, &req, &alice()).await.unwrap_err();

    assert_eq!(err.status(), 403);
    assert_eq!(
        err.description().as_deref(),
        Some("check constraint of an insert/update permission has failed")
    );
    let calls = client.calls();
    assert_eq!(calls[0], Call::Begin(TxMode::ReadWrite));
    assert!(ends_with_rollback(&calls));
}

/// Driver errors are translated and the transaction is rolled back.
#[tokio::test]
async fn test_postgresql_driver_error_translated() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Postgresql, &engine);

    let client = ScriptedClient::new(Dialect::Postgresql);
    client.push_one(Err(DbError::postgres("23505", "duplicate key")));
    let req = normalized(Method::POST, "/items", &[], "{}").await;
    let err = gw.handle_normalized(&client, &req, &alice()).await.unwrap_err();
    assert_eq!(err.status(), 409);
    assert!(ends_with_rollback(&client.calls()));

    let client = ScriptedClient::new(Dialect::Postgresql);
    client.push_one(Err(DbError::postgres("42501", "permission denied for table items")));
    let req = normalized(Method::GET, "/items", &[], "").await;
    let err = gw.handle_normalized(&client, &req, &anonymous()).await.unwrap_err();
    assert_eq!(err.status(), 401);
}

// =============================================================================
// SQLite Flow Tests
// =============================================================================

/// Reads need no transaction; the context is visible during the statement
/// and gone afterwards.
#[tokio::test]
async fn test_sqlite_read_uses_context_scope() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Sqlite, &engine);
    let client = ScriptedClient::new(Dialect::Sqlite);
    client.push_one(Ok(Some(response_row("[]", 0))));

    let req = normalized(Method::GET, "/items", &[], "").await;
    gw.handle_normalized(&client, &req, &anonymous()).await.unwrap();

    assert_eq!(client.calls(), vec![Call::GetOne(engine.main.clone())]);
    assert_eq!(client.seen_roles(), vec![Some("anonymous".to_string())]);
    assert!(client.store().unwrap().is_empty());
}

/// Mutated ids flow into every placeholder slot of the select statement.
#[tokio::test]
async fn test_sqlite_two_phase_substitutes_ids() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Sqlite, &engine);
    let client = ScriptedClient::new(Dialect::Sqlite);
    client.push_all(Ok(vec![flagged(3, 1), flagged(1, 1)]));
    client.push_one(Ok(Some(response_row("[{\"id\":3},{\"id\":1}]", 2))));

    let req = normalized(Method::POST, "/items", &[], r#"[{"name":"a"},{"name":"b"}]"#).await;
    let response = gw.handle_normalized(&client, &req, &alice()).await.unwrap();
    assert_eq!(response.status, 200);

    let calls = client.calls();
    assert_eq!(calls[0], Call::Begin(TxMode::ReadWrite));
    assert_eq!(calls[1], Call::GetAll(engine.mutate.clone()));
    match &calls[2] {
        Call::GetOne(select) => {
            assert_eq!(select.query, engine.select.query);
            assert_eq!(
                select.parameters,
                vec![Param::from("s1"), Param::from("[3,1]"), Param::from(7i64)]
            );
        }
        other => panic!("expected select, got {:?}", other),
    }
    assert_eq!(calls[3], Call::Commit);
    assert_eq!(client.seen_roles(), vec![Some("alice".to_string()); 2]);
    assert!(client.store().unwrap().is_empty());
}

/// One falsy flag rejects the batch before the select phase runs.
#[tokio::test]
async fn test_sqlite_falsy_flag_never_selects() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Sqlite, &engine);
    let client = ScriptedClient::new(Dialect::Sqlite);
    client.push_all(Ok(vec![flagged(1, 1), flagged(2, 0)]));

    let req = normalized(Method::POST, "/items", &[], "[]").await;
    let err = gw.handle_normalized(&client, &req, &alice()).await.unwrap_err();

    assert_eq!(err.status(), 403);
    let calls = client.calls();
    assert!(!calls.iter().any(|c| matches!(c, Call::GetOne(_))));
    assert!(ends_with_rollback(&calls));
    assert!(client.store().unwrap().is_empty());
}

/// A role under a row check must get a flag column back; without one the
/// mutation fails closed. Roles without a check do not need it.
#[tokio::test]
async fn test_sqlite_missing_flag_depends_on_row_check() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Sqlite, &engine);
    let unflagged = vec![Row::new().with("id", json!(5))];

    let client = ScriptedClient::new(Dialect::Sqlite);
    client.push_all(Ok(unflagged.clone()));
    let req = normalized(Method::POST, "/items", &[], "{}").await;
    let err = gw.handle_normalized(&client, &req, &alice()).await.unwrap_err();
    assert_eq!(err.status(), 403);

    let client = ScriptedClient::new(Dialect::Sqlite);
    client.push_all(Ok(unflagged));
    client.push_one(Ok(Some(response_row("[]", 1))));
    let bob = AuthContext {
        role: "bob".into(),
        claims: Some(json!({"role": "bob"})),
        authenticated: true,
    };
    gw.handle_normalized(&client, &req, &bob).await.unwrap();
    assert_eq!(client.calls().last(), Some(&Call::Commit));
}

// =============================================================================
// MySQL Flow Tests
// =============================================================================

/// Inserts recover ids as the contiguous range from the first generated id.
#[tokio::test]
async fn test_mysql_insert_uses_id_range() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Mysql, &engine);
    let client = ScriptedClient::new(Dialect::Mysql);
    client.push_run(Ok(ExecOutcome::default()));
    client.push_run(Ok(ExecOutcome {
        affected_rows: 3,
        last_insert_id: Some(10),
    }));
    client.push_one(Ok(Some(response_row("[]", 3))));

    let req = normalized(Method::POST, "/items", &[], "[{},{},{}]").await;
    gw.handle_normalized(&client, &req, &alice()).await.unwrap();

    let calls = client.calls();
    assert_eq!(calls[0], Call::Begin(TxMode::ReadWrite));
    match &calls[1] {
        Call::Run(env) => {
            assert!(env.query.starts_with("set @role = ?"));
            assert!(env.query.ends_with("@subzero_ids = ?, @subzero_ignored_ids = ?"));
        }
        other => panic!("expected env statement, got {:?}", other),
    }
    assert_eq!(calls[2], Call::Run(engine.mutate.clone()));
    match &calls[3] {
        Call::GetOne(select) => assert_eq!(select.parameters[1], Param::from("[10,11,12]")),
        other => panic!("expected select, got {:?}", other),
    }
    assert_eq!(calls[4], Call::Commit);
}

/// Updates recover ids through the anti-join over the session id lists.
#[tokio::test]
async fn test_mysql_update_uses_surviving_ids() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Mysql, &engine);
    let client = ScriptedClient::new(Dialect::Mysql);
    client.push_run(Ok(ExecOutcome::default()));
    client.push_run(Ok(ExecOutcome {
        affected_rows: 2,
        last_insert_id: None,
    }));
    client.push_all(Ok(vec![
        Row::new().with("val", json!(4)),
        Row::new().with("val", json!("9")),
    ]));
    client.push_one(Ok(Some(response_row("[]", 2))));

    let req = normalized(Method::PATCH, "/items?id=in.(4,9)", &[], r#"{"name":"z"}"#).await;
    gw.handle_normalized(&client, &req, &alice()).await.unwrap();

    let calls = client.calls();
    match &calls[3] {
        Call::GetAll(stmt) => assert_eq!(stmt.query, SURVIVING_IDS_QUERY),
        other => panic!("expected id recovery, got {:?}", other),
    }
    match &calls[4] {
        Call::GetOne(select) => assert_eq!(select.parameters[1], Param::from("[4,9]")),
        other => panic!("expected select, got {:?}", other),
    }
}

// =============================================================================
// Post-check Tests
// =============================================================================

/// PUT must touch exactly one row.
#[tokio::test]
async fn test_put_must_match_one_row() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Postgresql, &engine);
    let client = ScriptedClient::new(Dialect::Postgresql);
    client.push_one(Ok(Some(response_row("[]", 2))));

    let req = normalized(Method::PUT, "/items?id=eq.1", &[], r#"{"id":1}"#).await;
    let err = gw.handle_normalized(&client, &req, &alice()).await.unwrap_err();
    assert!(matches!(err, ApiError::PutMatchingPk));
    assert!(ends_with_rollback(&client.calls()));
}

/// Singular responses require exactly one row.
#[tokio::test]
async fn test_singular_accept_requires_one_row() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Postgresql, &engine);
    let client = ScriptedClient::new(Dialect::Postgresql);
    client.push_one(Ok(Some(response_row("[]", 0))));

    let req = normalized(
        Method::GET,
        "/items?id=eq.42",
        &[("Accept", "application/vnd.pgrst.object+json")],
        "",
    )
    .await;
    let err = gw.handle_normalized(&client, &req, &anonymous()).await.unwrap_err();
    assert_eq!(err.status(), 406);
}

/// `tx_rollback` discards successful work.
#[tokio::test]
async fn test_tx_rollback_option() {
    let engine = FixedEngine::new();
    let mut config = GatewayConfig::default();
    config.handler.tx_rollback = true;
    let gw = gateway_with(config, &engine);
    let client = ScriptedClient::new(Dialect::Postgresql);
    client.push_one(Ok(Some(response_row("[]", 1))));

    let req = normalized(Method::POST, "/items", &[], "{}").await;
    let response = gw.handle_normalized(&client, &req, &alice()).await.unwrap();
    assert_eq!(response.status, 200);
    assert!(ends_with_rollback(&client.calls()));
}

// =============================================================================
// Response Shaping Tests
// =============================================================================

/// Status and headers set by the statement reach the response.
#[tokio::test]
async fn test_statement_controls_status_and_headers() {
    let engine = FixedEngine::new();
    let gw = gateway(Dialect::Postgresql, &engine);
    let client = ScriptedClient::new(Dialect::Postgresql);
    let row = Row::new()
        .with("body", json!(""))
        .with("page_total", json!(1))
        .with("total_result_set", json!(1))
        .with("response_headers", json!(r#"[{"location":"/items?id=eq.1"}]"#))
        .with("response_status", json!("201"));
    client.push_one(Ok(Some(row)));

    let req = normalized(Method::POST, "/items?offset=0", &[], "{}").await;
    let response = gw.handle_normalized(&client, &req, &alice()).await.unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(response.header("location"), Some("/items?id=eq.1"));
    assert_eq!(response.header("content-range"), Some("0-0/1"));
    assert_eq!(response.header("content-length"), Some("0"));
}
