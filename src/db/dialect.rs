//! Target database dialects and their capabilities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Database engine a statement is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Config-variable style session context (`set_config`)
    Postgresql,
    /// Embedded engine, context exposed through registered functions
    Sqlite,
    /// Session-variable style context (`SET @var = ?`)
    Mysql,
}

impl Dialect {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgresql => "postgresql",
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
        }
    }

    /// Whether row-level predicates are enforced inside the mutation itself.
    ///
    /// When true, rows failing a predicate never appear in the mutation
    /// result, so an absent constraint flag column is acceptable. MySQL
    /// counts: the mutation records rejected ids in a session list and the
    /// id reconstruction leaves them out.
    pub fn native_row_predicates(&self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }

    /// Whether the driver returns identifiers of mutated rows directly.
    pub fn returns_mutated_ids(&self) -> bool {
        !matches!(self, Dialect::Mysql)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(Dialect::Postgresql),
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::Mysql),
            other => Err(format!("unsupported database type: {}", other)),
        }
    }
}
