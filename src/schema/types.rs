//! Schema model produced by introspection.
//!
//! The database describes itself as
//! `{"schemas": [{"name": .., "objects": [..]}]}`; permission and relation
//! declarations not recoverable from the catalog are merged in by the
//! introspection query.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{SchemaError, SchemaResult};

/// Role every other role inherits grants and policies from
pub const PUBLIC_ROLE: &str = "public";

/// The full introspected schema.
///
/// Immutable once handed to a compiler; a reload builds a new instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub schemas: Vec<DbSchema>,
    /// Whether grants and policies are checked by this layer rather than the database
    #[serde(default)]
    pub use_internal_permissions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbSchema {
    pub name: String,
    #[serde(default)]
    pub objects: Vec<SchemaObject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Table,
    View,
    Function,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaObject {
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub columns: Vec<SchemaColumn>,
    #[serde(default)]
    pub foreign_keys: Vec<SchemaForeignKey>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub primary_key: bool,
}

/// Foreign key used to resolve embedding joins.
///
/// Table references are `(schema, table)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaForeignKey {
    pub name: String,
    pub table: (String, String),
    pub columns: Vec<String>,
    pub referenced_table: (String, String),
    pub referenced_columns: Vec<String>,
}

/// Action a grant or policy applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Select,
    Insert,
    Update,
    Delete,
    All,
}

impl Action {
    /// Action exercised by an HTTP method
    pub fn for_method(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "POST" => Action::Insert,
            "PUT" | "PATCH" => Action::Update,
            "DELETE" => Action::Delete,
            _ => Action::Select,
        }
    }

    fn covers(&self, other: Action) -> bool {
        *self == Action::All || *self == other
    }
}

/// Role-scoped permission entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Permission {
    Grant(Grant),
    Policy(Policy),
}

impl Permission {
    pub fn role(&self) -> &str {
        match self {
            Permission::Grant(g) => &g.role,
            Permission::Policy(p) => &p.role,
        }
    }

    /// Applies to `role` directly or through `public`
    pub fn applies_to(&self, role: &str) -> bool {
        let r = self.role();
        r == role || r == PUBLIC_ROLE
    }
}

/// Action grant, optionally restricted to columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub role: String,
    pub grant: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

/// Row-level predicate scoped to actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub role: String,
    pub policy_for: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Value>,
}

impl Schema {
    /// Parse the introspection result.
    ///
    /// Parse failures are reported as [`SchemaError::InvalidJson`] so the
    /// bootstrap loop never retries them.
    pub fn from_json(text: &str) -> SchemaResult<Self> {
        let schema: Schema = serde_json::from_str(text)
            .map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_value(value: Value) -> SchemaResult<Self> {
        let schema: Schema = serde_json::from_value(value)
            .map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Structural checks not expressible through serde
    pub fn validate(&self) -> SchemaResult<()> {
        for db_schema in &self.schemas {
            if db_schema.name.is_empty() {
                return Err(SchemaError::Invalid("schema with empty name".into()));
            }
            let mut seen = std::collections::HashSet::new();
            for object in &db_schema.objects {
                if !seen.insert(object.name.as_str()) {
                    return Err(SchemaError::Invalid(format!(
                        "duplicate object '{}' in schema '{}'",
                        object.name, db_schema.name
                    )));
                }
                object.validate_permissions()?;
            }
        }
        Ok(())
    }

    pub fn schema_names(&self) -> Vec<String> {
        self.schemas.iter().map(|s| s.name.clone()).collect()
    }

    pub fn find_schema(&self, name: &str) -> Option<&DbSchema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    pub fn find_object(&self, schema: &str, name: &str) -> Option<&SchemaObject> {
        self.find_schema(schema)?.objects.iter().find(|o| o.name == name)
    }
}

impl SchemaObject {
    /// Whether `role` is subject to a row predicate for `action` on this object
    pub fn has_row_check(&self, role: &str, action: Action) -> bool {
        self.permissions.iter().any(|p| match p {
            Permission::Policy(policy) => {
                p.applies_to(role)
                    && policy.policy_for.iter().any(|a| a.covers(action))
                    && (policy.using.is_some() || policy.check.is_some())
            }
            Permission::Grant(_) => false,
        })
    }

    /// Permissions applying to `role`, including `public` ones
    pub fn permissions_for<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a Permission> + 'a {
        self.permissions.iter().filter(move |p| p.applies_to(role))
    }

    fn validate_permissions(&self) -> SchemaResult<()> {
        for permission in &self.permissions {
            let empty = match permission {
                Permission::Grant(g) => g.grant.is_empty(),
                Permission::Policy(p) => p.policy_for.is_empty(),
            };
            if permission.role().is_empty() || empty {
                return Err(SchemaError::Invalid(format!(
                    "invalid permission on '{}': role and actions are required",
                    self.name
                )));
            }
            if let Permission::Grant(Grant { columns: Some(cols), .. }) = permission {
                if let Some(missing) = cols
                    .iter()
                    .find(|c| !self.columns.is_empty() && !self.columns.iter().any(|sc| &sc.name == *c))
                {
                    return Err(SchemaError::Invalid(format!(
                        "grant on '{}' names unknown column '{}'",
                        self.name, missing
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "schemas": [{
                "name": "public",
                "objects": [{
                    "name": "items",
                    "kind": "table",
                    "columns": [
                        {"name": "id", "data_type": "integer", "primary_key": true},
                        {"name": "owner", "data_type": "text"}
                    ],
                    "foreign_keys": [],
                    "permissions": [
                        {"role": "public", "grant": ["select"]},
                        {"role": "alice", "grant": ["insert", "update"], "columns": ["owner"]},
                        {"role": "alice", "policy_for": ["update"], "check": {"column": "owner"}}
                    ]
                }]
            }]
        })
    }

    #[test]
    fn test_parse_grants_and_policies() {
        let schema = Schema::from_value(sample()).unwrap();
        let items = schema.find_object("public", "items").unwrap();
        assert_eq!(items.permissions.len(), 3);
        assert!(matches!(items.permissions[0], Permission::Grant(_)));
        assert!(matches!(items.permissions[2], Permission::Policy(_)));
        assert!(!schema.use_internal_permissions);
    }

    #[test]
    fn test_has_row_check() {
        let schema = Schema::from_value(sample()).unwrap();
        let items = schema.find_object("public", "items").unwrap();
        assert!(items.has_row_check("alice", Action::Update));
        assert!(!items.has_row_check("alice", Action::Insert));
        assert!(!items.has_row_check("bob", Action::Update));
    }

    #[test]
    fn test_public_policy_applies_to_everyone() {
        let mut value = sample();
        value["schemas"][0]["objects"][0]["permissions"] =
            json!([{"role": "public", "policy_for": ["all"], "using": true}]);
        let schema = Schema::from_value(value).unwrap();
        let items = schema.find_object("public", "items").unwrap();
        assert!(items.has_row_check("anyone", Action::Delete));
    }

    #[test]
    fn test_invalid_json_is_format_error() {
        let err = Schema::from_json("{not json").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidJson(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_grant_with_unknown_column_rejected() {
        let mut value = sample();
        value["schemas"][0]["objects"][0]["permissions"] =
            json!([{"role": "a", "grant": ["select"], "columns": ["nope"]}]);
        let err = Schema::from_value(value).unwrap_err();
        assert!(matches!(err, SchemaError::Invalid(_)));
    }

    #[test]
    fn test_action_for_method() {
        assert_eq!(Action::for_method("post"), Action::Insert);
        assert_eq!(Action::for_method("PATCH"), Action::Update);
        assert_eq!(Action::for_method("GET"), Action::Select);
    }
}
