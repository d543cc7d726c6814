//! Role-filtered views of the schema for client tooling.

use std::collections::BTreeMap;

use serde::Serialize;

use super::types::{Action, DbSchema, Permission, SchemaColumn, SchemaForeignKey, SchemaObject, ObjectKind};

/// Object as exposed to a role
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectView {
    pub name: String,
    pub kind: ObjectKind,
    pub columns: Vec<SchemaColumn>,
    pub foreign_keys: Vec<SchemaForeignKey>,
}

/// One UI-level permission entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionView {
    pub action: Vec<&'static str>,
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

fn visible_to(object: &SchemaObject, role: &str) -> bool {
    object.permissions_for(role).next().is_some()
}

/// Objects `role` has any permission on, keyed by name.
///
/// Foreign keys pointing outside the schema or at objects the role cannot
/// see are dropped; column types are lower-cased.
pub fn schema_view(schema: &DbSchema, role: &str) -> BTreeMap<String, ObjectView> {
    schema
        .objects
        .iter()
        .filter(|o| visible_to(o, role))
        .map(|o| {
            let foreign_keys = o
                .foreign_keys
                .iter()
                .filter(|fk| {
                    let (ref_schema, ref_table) = &fk.referenced_table;
                    ref_schema == &schema.name
                        && schema
                            .objects
                            .iter()
                            .any(|t| &t.name == ref_table && visible_to(t, role))
                })
                .cloned()
                .collect();
            let columns = o
                .columns
                .iter()
                .map(|c| SchemaColumn {
                    name: c.name.clone(),
                    data_type: c.data_type.to_lowercase(),
                    primary_key: c.primary_key,
                })
                .collect();
            let view = ObjectView {
                name: o.name.clone(),
                kind: o.kind,
                columns,
                foreign_keys,
            };
            (o.name.clone(), view)
        })
        .collect()
}

/// UI actions implied by a grant
pub fn ui_actions(action: Action) -> &'static [&'static str] {
    match action {
        Action::Select => &["list", "show", "read", "export"],
        Action::Insert => &["create"],
        Action::Update => &["edit", "update"],
        Action::Delete => &["delete"],
        Action::All => &["list", "show", "read", "export", "create", "edit", "update", "delete"],
    }
}

/// Grants applying to `role`, translated to UI actions.
///
/// Row policies carry no UI action and are skipped.
pub fn permissions_view(schema: &DbSchema, role: &str) -> BTreeMap<String, Vec<PermissionView>> {
    let entries = schema
        .objects
        .iter()
        .flat_map(|o| {
            o.permissions_for(role).filter_map(move |p| match p {
                Permission::Grant(grant) => Some(PermissionView {
                    action: grant.grant.iter().flat_map(|a| ui_actions(*a).iter().copied()).collect(),
                    resource: o.name.clone(),
                    columns: grant.columns.clone().filter(|c| !c.is_empty()),
                }),
                Permission::Policy(_) => None,
            })
        })
        .collect();
    let mut out = BTreeMap::new();
    out.insert(role.to_string(), entries);
    out
}
