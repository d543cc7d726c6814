//! Per-dialect rendering of the request context.
//!
//! PostgreSQL gets a `set_config` select, MySQL a `SET` of session
//! variables. SQLite has no SQL form; its context goes through
//! [`ContextStore`](super::ContextStore) instead.

use crate::compiler::{Param, Statement};
use crate::db::Dialect;

use super::Env;

/// Pair injected when the env is empty so the select is never zero-column
pub const DUMMY_ENV_KEY: &str = "subzero._dummy_";
pub const DUMMY_ENV_VALUE: &str = "true";

/// Session variable holding candidate ids for update/delete on MySQL
pub const MYSQL_IDS_VAR: &str = "subzero_ids";
/// Session variable holding ids rejected by the row predicate on MySQL
pub const MYSQL_IGNORED_IDS_VAR: &str = "subzero_ignored_ids";

/// Render the env for `dialect`, or `None` when the dialect has no SQL form
pub fn fmt_env(dialect: Dialect, env: &Env) -> Option<Statement> {
    match dialect {
        Dialect::Postgresql => Some(fmt_postgresql_env(env)),
        Dialect::Mysql => Some(fmt_mysql_env(env)),
        Dialect::Sqlite => None,
    }
}

/// `select set_config($1, $2, true), ...`
///
/// The last call is projected under its key so a query wrapping this
/// statement in a materialized CTE can reference it by name.
pub fn fmt_postgresql_env(env: &Env) -> Statement {
    let mut pairs: Vec<(&str, &str)> = env.iter().collect();
    if pairs.is_empty() {
        pairs.push((DUMMY_ENV_KEY, DUMMY_ENV_VALUE));
    }

    let last = pairs.len() - 1;
    let mut parameters = Vec::with_capacity(pairs.len() * 2);
    let mut columns = Vec::with_capacity(pairs.len());
    for (i, (key, value)) in pairs.iter().enumerate() {
        let n = i * 2 + 1;
        let mut column = format!("set_config(${}, ${}, true)", n, n + 1);
        if i == last {
            column.push_str(" as ");
            column.push_str(&quote_ident(key));
        }
        columns.push(column);
        parameters.push(Param::from(*key));
        parameters.push(Param::from(*value));
    }

    Statement::new(format!("select {}", columns.join(", ")), parameters)
}

/// `set @key = ?, ...` followed by the two id-list variables
pub fn fmt_mysql_env(env: &Env) -> Statement {
    let implicit = [(MYSQL_IDS_VAR, "[]"), (MYSQL_IGNORED_IDS_VAR, "[]")];
    let mut assignments = Vec::with_capacity(env.len() + implicit.len());
    let mut parameters = Vec::with_capacity(env.len() + implicit.len());
    for (key, value) in env.iter().chain(implicit) {
        assignments.push(format!("@{} = ?", quote_mysql_var(key)));
        parameters.push(Param::from(value));
    }
    Statement::new(format!("set {}", assignments.join(", ")), parameters)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// Plain identifiers stay bare; anything else (dots in `request.jwt.claims`)
// needs backticks.
fn quote_mysql_var(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}
