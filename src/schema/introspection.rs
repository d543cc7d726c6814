//! Bootstrap query asking a database to describe itself as JSON.
//!
//! Each dialect has a raw template containing markers of the form
//! `'[]'--<name>.json`. A marker is replaced by the caller's value for that
//! name as a JSON string literal, or by `'[]'` when no value was given.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::compiler::{Param, Statement};
use crate::db::Dialect;

/// Marker name for custom permission declarations
pub const PERMISSIONS_FILE: &str = "permissions.json";
/// Marker name for custom relation declarations
pub const RELATIONS_FILE: &str = "relations.json";

const EMPTY_MARKER_VALUE: &str = "'[]'";

const POSTGRESQL_TEMPLATE: &str = include_str!("sql/postgresql.sql");
const SQLITE_TEMPLATE: &str = include_str!("sql/sqlite.sql");
const MYSQL_TEMPLATE: &str = include_str!("sql/mysql.sql");

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"'\[\]'--([a-zA-Z0-9_.]+\.json)").expect("marker regex is valid")
    })
}

/// Template before any marker is replaced
pub fn raw_introspection_query(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgresql => POSTGRESQL_TEMPLATE,
        Dialect::Sqlite => SQLITE_TEMPLATE,
        Dialect::Mysql => MYSQL_TEMPLATE,
    }
}

/// Replace every marker in `raw` with its override or the empty default
pub fn splice_markers(raw: &str, dialect: Dialect, overrides: &HashMap<String, Value>) -> String {
    marker_regex()
        .replace_all(raw, |caps: &Captures<'_>| match overrides.get(&caps[1]) {
            Some(value) => format!("'{}'", escape_literal(dialect, &value.to_string())),
            None => EMPTY_MARKER_VALUE.to_string(),
        })
        .into_owned()
}

/// Build the introspection statement for `schemas`.
///
/// PostgreSQL receives the schema list as an array plus the
/// `include_all_db_roles` flag; SQLite and MySQL receive the list as one
/// JSON string.
pub fn introspection_query(
    dialect: Dialect,
    schemas: &[String],
    overrides: &HashMap<String, Value>,
    include_all_db_roles: bool,
) -> Statement {
    let query = splice_markers(raw_introspection_query(dialect), dialect, overrides);
    let parameters = match dialect {
        Dialect::Postgresql => vec![Param::from(schemas.to_vec()), Param::from(include_all_db_roles)],
        Dialect::Sqlite | Dialect::Mysql => {
            vec![Param::text(Value::from(schemas.to_vec()).to_string())]
        }
    };
    Statement::new(query, parameters)
}

// The spliced JSON sits inside a single-quoted literal. MySQL also treats
// backslash as an escape inside literals.
fn escape_literal(dialect: Dialect, json: &str) -> String {
    let quoted = json.replace('\'', "''");
    match dialect {
        Dialect::Mysql => quoted.replace('\\', "\\\\"),
        _ => quoted,
    }
}
