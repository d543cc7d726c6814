//! Id reconstruction for drivers that do not return mutated rows.

use serde_json::Value;

use crate::compiler::Statement;
use crate::db::{as_i64, ExecOutcome, Row};

/// Ids targeted by the mutation minus the ones the row predicate rejected
pub const SURVIVING_IDS_QUERY: &str = "select t.val \
from json_table(@subzero_ids, '$[*]' columns (val integer path '$')) as t \
left join json_table(@subzero_ignored_ids, '$[*]' columns (val integer path '$')) as t2 \
on t.val = t2.val \
where t2.val is null";

/// How to recover the ids of a mutation
#[derive(Debug, Clone, PartialEq)]
pub enum IdRecovery {
    /// Known without another round trip
    Known(Vec<Value>),
    /// Run this read and take the first column of each row
    Query(Statement),
}

/// Decide how to recover mutated ids from a driver outcome.
///
/// Inserts report the first generated id and a row count; the ids are the
/// contiguous range from there. Anything else goes through the session id
/// lists.
pub fn recover_ids(outcome: &ExecOutcome) -> IdRecovery {
    match (outcome.last_insert_id, outcome.affected_rows) {
        (Some(id), n) if id > 0 && n > 0 => {
            IdRecovery::Known((0..n as i64).map(|i| Value::from(id + i)).collect())
        }
        _ => IdRecovery::Query(Statement::raw(SURVIVING_IDS_QUERY)),
    }
}

/// First column of each row as an id
pub fn ids_from_rows(rows: &[Row]) -> Vec<Value> {
    rows.iter()
        .filter_map(|r| r.first())
        .map(|v| as_i64(v).map(Value::from).unwrap_or_else(|| v.clone()))
        .collect()
}
