//! Schema Loading Tests
//!
//! The introspection bootstrap loop:
//! - connection failures retried with backoff until the schema arrives
//! - the error surfaced once the retry limit is spent
//! - format errors never retried

mod common;

use std::time::Duration;

use restgate::compiler::Statement;
use restgate::db::{DbError, Dialect, Row};
use restgate::schema::{load_schema, RetryPolicy, SchemaError};
use serde_json::Value;
use tokio::time::Instant;

use common::{items_schema, ScriptedClient};

// =============================================================================
// Helper Functions
// =============================================================================

fn schema_row() -> Row {
    Row::new().with(
        "json_schema",
        Value::String(serde_json::to_string(&items_schema()).unwrap()),
    )
}

fn unreachable() -> DbError {
    DbError::Driver("connection refused".to_string())
}

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        initial_interval: Duration::from_millis(500),
        max_interval: Duration::from_secs(4),
        max_retries,
    }
}

// =============================================================================
// Retry Tests
// =============================================================================

/// Three refused connections, then the schema: four attempts and success.
#[tokio::test(start_paused = true)]
async fn test_retries_until_schema_arrives() {
    let client = ScriptedClient::new(Dialect::Postgresql);
    for _ in 0..3 {
        client.push_one(Err(unreachable()));
    }
    client.push_one(Ok(Some(schema_row())));

    let started = Instant::now();
    let schema = load_schema(&client, &Statement::raw("introspect"), &policy(5), true)
        .await
        .unwrap();

    assert_eq!(client.calls().len(), 4);
    assert!(schema.find_object("public", "items").is_some());
    assert!(schema.use_internal_permissions);
    // 1s + 2s + 4s of backoff
    assert!(started.elapsed() >= Duration::from_secs(7));
}

/// Once the retry limit is spent the connection error is returned.
#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_retries() {
    let client = ScriptedClient::new(Dialect::Postgresql);
    for _ in 0..10 {
        client.push_one(Err(unreachable()));
    }

    let err = load_schema(&client, &Statement::raw("introspect"), &policy(2), false)
        .await
        .unwrap_err();

    assert!(matches!(err, SchemaError::Connection(_)));
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(client.calls().len(), 3);
}

/// A missing row counts as a format problem and is not retried.
#[tokio::test(start_paused = true)]
async fn test_empty_result_not_retried() {
    let client = ScriptedClient::new(Dialect::Postgresql);
    client.push_one(Ok(None));

    let err = load_schema(&client, &Statement::raw("introspect"), &policy(5), false)
        .await
        .unwrap_err();

    assert!(matches!(err, SchemaError::Empty));
    assert_eq!(client.calls().len(), 1);
}
