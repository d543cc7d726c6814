//! Gateway Configuration
//!
//! Loaded from a JSON file. Every field has a default so a minimal file
//! only names the dialect.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::db::Dialect;
use crate::schema::{RetryPolicy, PERMISSIONS_FILE, RELATIONS_FILE};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Target database engine (default: postgresql)
    #[serde(default = "default_dialect")]
    pub dialect: Dialect,

    /// Exposed schemas; the first is the default (default: ["public"])
    #[serde(default = "default_db_schemas")]
    pub db_schemas: Vec<String>,

    /// Permission declarations spliced into the introspection query
    #[serde(default)]
    pub permissions: Option<Value>,

    /// Relations the catalog cannot report (views, cross-schema)
    #[serde(default)]
    pub custom_relations: Option<Value>,

    /// Functions callable from `select`; `None` leaves the engine default
    #[serde(default)]
    pub allowed_select_functions: Option<Vec<String>>,

    /// Enumerate every database role during introspection (default: false)
    #[serde(default)]
    pub include_all_db_roles: bool,

    /// Check permissions in the compiled statements (default: true)
    #[serde(default = "default_true")]
    pub use_internal_permissions_check: bool,

    /// Bootstrap retries, 0 retries forever (default: 10)
    #[serde(default = "default_max_retries")]
    pub db_max_connection_retries: u32,

    /// Ceiling for the bootstrap backoff in seconds (default: 10)
    #[serde(default = "default_max_retry_interval")]
    pub db_max_connection_retry_interval_secs: u64,

    #[serde(default)]
    pub handler: HandlerOptions,
}

/// Per-request behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerOptions {
    /// Run each request in its own transaction (default: true)
    #[serde(default = "default_true")]
    pub wrap_in_transaction: bool,

    /// Push the request env into the session (default: true)
    #[serde(default = "default_true")]
    pub set_db_env: bool,

    /// Role for requests without a token (default: "anonymous")
    #[serde(default = "default_anon_role")]
    pub db_anon_role: String,

    /// Appended to `search_path` (default: ["public"])
    #[serde(default = "default_extra_search_path")]
    pub db_extra_search_path: Vec<String>,

    /// Hard cap on rows per response
    #[serde(default)]
    pub db_max_rows: Option<u32>,

    /// Stripped from the URL path to get the entity (default: "/")
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,

    /// Roll back instead of committing; used by test suites (default: false)
    #[serde(default)]
    pub tx_rollback: bool,

    /// HS256 secret; without it every request is anonymous
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default)]
    pub jwt_audience: Option<String>,

    /// Dotted path of the role claim (default: "role")
    #[serde(default = "default_role_claim_key")]
    pub role_claim_key: String,
}

fn default_dialect() -> Dialect {
    Dialect::Postgresql
}

fn default_db_schemas() -> Vec<String> {
    vec!["public".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    10
}

fn default_max_retry_interval() -> u64 {
    10
}

fn default_anon_role() -> String {
    "anonymous".to_string()
}

fn default_extra_search_path() -> Vec<String> {
    vec!["public".to_string()]
}

fn default_url_prefix() -> String {
    "/".to_string()
}

fn default_role_claim_key() -> String {
    "role".to_string()
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            wrap_in_transaction: true,
            set_db_env: true,
            db_anon_role: default_anon_role(),
            db_extra_search_path: default_extra_search_path(),
            db_max_rows: None,
            url_prefix: default_url_prefix(),
            tx_rollback: false,
            jwt_secret: None,
            jwt_audience: None,
            role_claim_key: default_role_claim_key(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            db_schemas: default_db_schemas(),
            permissions: None,
            custom_relations: None,
            allowed_select_functions: None,
            include_all_db_roles: false,
            use_internal_permissions_check: true,
            db_max_connection_retries: default_max_retries(),
            db_max_connection_retry_interval_secs: default_max_retry_interval(),
            handler: HandlerOptions::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.db_schemas.is_empty() {
            return Err(ConfigError::Invalid("db_schemas must not be empty".into()));
        }
        if !self.handler.url_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "url_prefix must start with '/': {}",
                self.handler.url_prefix
            )));
        }
        Ok(())
    }

    /// Backoff for schema bootstrap
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_interval: Duration::from_secs(self.db_max_connection_retry_interval_secs),
            max_retries: self.db_max_connection_retries,
            ..RetryPolicy::default()
        }
    }

    /// Marker overrides for the introspection template
    pub fn introspection_overrides(&self) -> HashMap<String, Value> {
        let mut overrides = HashMap::new();
        if let Some(p) = &self.permissions {
            overrides.insert(PERMISSIONS_FILE.to_string(), p.clone());
        }
        if let Some(r) = &self.custom_relations {
            overrides.insert(RELATIONS_FILE.to_string(), r.clone());
        }
        overrides
    }
}
