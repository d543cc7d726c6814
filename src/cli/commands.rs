//! CLI command implementations
//!
//! Each command prints one JSON document and exits. Nothing here keeps
//! state between invocations.

use std::path::Path;

use serde_json::{json, Value};

use crate::api::{status_from_mysql_code, status_from_pg_code, status_from_sqlite_code};
use crate::config::GatewayConfig;
use crate::context::{fmt_env, Env};
use crate::db::{Dialect, SqliteClient};
use crate::observability;
use crate::schema::{introspection_query, load_schema, permissions_view, schema_view, Schema, SchemaError};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_json;

/// Main entry point for CLI
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    observability::init_logging(cli.log_json);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Introspect { config } => introspect(&config),
        Command::Schema {
            config,
            database,
            role,
            permissions,
        } => schema(&config, &database, role.as_deref(), permissions),
        Command::Env { dialect, pairs } => env(dialect, pairs),
        Command::Status {
            dialect,
            code,
            authenticated,
        } => status(dialect, &code, authenticated),
    }
}

/// Print the introspection statement for `config_path`
pub fn introspect(config_path: &Path) -> CliResult<()> {
    let config = GatewayConfig::from_file(config_path)?;
    let statement = introspection_query(
        config.dialect,
        &config.db_schemas,
        &config.introspection_overrides(),
        config.include_all_db_roles,
    );
    write_json(&statement)
}

/// Introspect an SQLite file and print the role-filtered view
pub fn schema(config_path: &Path, database: &Path, role: Option<&str>, permissions: bool) -> CliResult<()> {
    let config = GatewayConfig::from_file(config_path)?;
    if config.dialect != Dialect::Sqlite {
        return Err(CliError::usage_error(format!(
            "schema command needs an sqlite config, got {}",
            config.dialect
        )));
    }
    let role = role.unwrap_or(&config.handler.db_anon_role);
    let schema = load_sqlite_schema(&config, database)?;
    let db_schema = config
        .db_schemas
        .first()
        .and_then(|name| schema.find_schema(name))
        .ok_or_else(|| CliError::database_error("configured schema not found in database"))?;

    let view = if permissions {
        serde_json::to_value(permissions_view(db_schema, role))?
    } else {
        serde_json::to_value(schema_view(db_schema, role))?
    };
    write_json(&view)
}

fn load_sqlite_schema(config: &GatewayConfig, database: &Path) -> CliResult<Schema> {
    let client = SqliteClient::open(database)?;
    let statement = introspection_query(
        config.dialect,
        &config.db_schemas,
        &config.introspection_overrides(),
        config.include_all_db_roles,
    );
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime
        .block_on(load_schema(
            &client,
            &statement,
            &config.retry_policy(),
            config.use_internal_permissions_check,
        ))
        .map_err(|e: SchemaError| CliError::database_error(e.to_string()))
}

/// Print the env statement for `dialect`
pub fn env(dialect: Dialect, pairs: Vec<(String, String)>) -> CliResult<()> {
    let env: Env = pairs.into_iter().collect();
    let output: Value = match fmt_env(dialect, &env) {
        Some(statement) => serde_json::to_value(statement)?,
        None => json!({
            "note": "sqlite reads the env through env() and jwt(), no statement is issued",
            "env": env,
        }),
    };
    write_json(&output)
}

/// Print the HTTP status for a native error code
pub fn status(dialect: Dialect, code: &str, authenticated: bool) -> CliResult<()> {
    let status = translate(dialect, code, authenticated)?;
    write_json(&json!({ "dialect": dialect, "code": code, "status": status }))
}

fn translate(dialect: Dialect, code: &str, authenticated: bool) -> CliResult<u16> {
    match dialect {
        Dialect::Postgresql => Ok(status_from_pg_code(code, authenticated)),
        Dialect::Sqlite => Ok(status_from_sqlite_code(code, authenticated)),
        Dialect::Mysql => code
            .parse::<u16>()
            .map(|c| status_from_mysql_code(c, authenticated))
            .map_err(|_| CliError::usage_error(format!("mysql error codes are numeric: {}", code))),
    }
}
