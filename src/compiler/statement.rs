//! Parameterized statements handed to database drivers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single bindable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => Value::from(*f),
            Scalar::Text(s) => Value::String(s.clone()),
        }
    }
}

/// A positional statement parameter: a scalar or an array of scalars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl Param {
    pub fn text(value: impl Into<String>) -> Self {
        Param::Scalar(Scalar::Text(value.into()))
    }

    /// True when this slot holds exactly the given text
    pub fn is_text(&self, expected: &str) -> bool {
        matches!(self, Param::Scalar(Scalar::Text(s)) if s == expected)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Param::Scalar(s) => s.to_json(),
            Param::List(items) => Value::Array(items.iter().map(Scalar::to_json).collect()),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::text(value)
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::text(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Scalar(Scalar::Int(value))
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Scalar(Scalar::Bool(value))
    }
}

impl From<Vec<String>> for Param {
    fn from(value: Vec<String>) -> Self {
        Param::List(value.into_iter().map(Scalar::Text).collect())
    }
}

/// Query text plus positional parameters.
///
/// Parameter order matches placeholder order in `query`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Statement {
    pub query: String,
    pub parameters: Vec<Param>,
}

impl Statement {
    pub fn new(query: impl Into<String>, parameters: Vec<Param>) -> Self {
        Self {
            query: query.into(),
            parameters,
        }
    }

    /// Statement without parameters
    pub fn raw(query: impl Into<String>) -> Self {
        Self::new(query, Vec::new())
    }
}
