//! Schema bootstrap.
//!
//! Runs the introspection statement once at startup, retrying connection
//! failures with capped exponential backoff. A malformed schema document
//! is never retried.

use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::compiler::Statement;
use crate::db::DbClient;
use crate::observability::Event;

use super::errors::{SchemaError, SchemaResult};
use super::types::Schema;

/// Column holding the schema document in the introspection result
pub const JSON_SCHEMA_COLUMN: &str = "json_schema";

/// Backoff for the bootstrap loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Zero retries forever
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            max_retries: 10,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    ///
    /// Doubles from `initial_interval` and never exceeds `max_interval`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(31));
        self.initial_interval
            .checked_mul(factor)
            .map_or(self.max_interval, |d| d.min(self.max_interval))
    }

    pub fn allows_retry(&self, retry: u32) -> bool {
        self.max_retries == 0 || retry <= self.max_retries
    }
}

/// Load and validate the schema through `client`.
///
/// `use_internal_permissions` is stamped onto the result.
pub async fn load_schema(
    client: &dyn DbClient,
    statement: &Statement,
    policy: &RetryPolicy,
    use_internal_permissions: bool,
) -> SchemaResult<Schema> {
    let mut retries = 0u32;
    loop {
        info!(event = Event::IntrospectionStart.as_str(), dialect = %client.dialect(), retries);
        match fetch_schema(client, statement).await {
            Ok(mut schema) => {
                schema.use_internal_permissions = use_internal_permissions;
                info!(
                    event = Event::SchemaLoaded.as_str(),
                    schemas = ?schema.schema_names(),
                    "database schema loaded"
                );
                return Ok(schema);
            }
            Err(e) => {
                retries += 1;
                if !e.is_retryable() || !policy.allows_retry(retries) {
                    warn!(event = Event::SchemaLoadFailed.as_str(), error = %e, retries);
                    return Err(e);
                }
                let delay = policy.delay_for(retries);
                warn!(
                    event = Event::SchemaRetry.as_str(),
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "failed to load schema, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn fetch_schema(client: &dyn DbClient, statement: &Statement) -> SchemaResult<Schema> {
    let _session = client.session().await;
    let row = client
        .get_one(statement)
        .await
        .map_err(|e| SchemaError::Connection(e.to_string()))?
        .ok_or(SchemaError::Empty)?;
    match row.get(JSON_SCHEMA_COLUMN).or_else(|| row.first()) {
        Some(Value::String(text)) => Schema::from_json(text),
        Some(value @ Value::Object(_)) => Schema::from_value(value.clone()),
        Some(other) => Err(SchemaError::InvalidJson(format!(
            "expected a json document, got {}",
            other
        ))),
        None => Err(SchemaError::Empty),
    }
}
