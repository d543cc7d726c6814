//! Two-phase mutate-then-select coordinator.
//!
//! Some dialects cannot run a permission-restricted mutation and return the
//! embedded representation of the affected rows in one statement. The
//! compiler then produces a mutate statement and a select template; the
//! template carries [`IDS_PLACEHOLDER`] in the parameter slots that must
//! receive the ids of the mutated rows.
//!
//! Lifecycle: unresolved -> resolved -> consumed. A permission failure
//! poisons the coordinator.

use serde_json::Value;

use crate::compiler::{Param, Statement};
use crate::db::Row;

use super::errors::{MutationError, MutationResult};
use super::verifier::ConstraintVerifier;

/// Parameter value standing in for the JSON list of mutated ids
pub const IDS_PLACEHOLDER: &str = r#"["_subzero_ids_placeholder_"]"#;

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Unresolved,
    Resolved(Vec<Value>),
    Consumed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TwoStepStatement {
    mutate: Statement,
    select: Statement,
    verifier: ConstraintVerifier,
    phase: Phase,
}

impl TwoStepStatement {
    pub fn new(mutate: Statement, select: Statement, verifier: ConstraintVerifier) -> Self {
        Self {
            mutate,
            select,
            verifier,
            phase: Phase::Unresolved,
        }
    }

    pub fn mutate_statement(&self) -> &Statement {
        &self.mutate
    }

    pub fn verifier(&self) -> &ConstraintVerifier {
        &self.verifier
    }

    /// Capture ids from the raw mutation result.
    ///
    /// The first column of each row is its id. Every row must pass the
    /// constraint check; otherwise nothing is resolved and the statement
    /// becomes unusable.
    pub fn set_mutated_rows(&mut self, rows: &[Row]) -> MutationResult<()> {
        self.ensure_unresolved()?;
        if let Err(e) = self.verifier.verify(rows) {
            self.phase = Phase::Failed;
            return Err(e);
        }
        let ids = rows
            .iter()
            .map(|r| r.first().cloned().unwrap_or(Value::Null))
            .collect();
        self.phase = Phase::Resolved(ids);
        Ok(())
    }

    /// Capture ids reconstructed outside the mutation result.
    ///
    /// Used when the driver cannot return mutated rows; the reconstruction
    /// already excludes rows rejected by the row predicate.
    pub fn set_resolved_ids(&mut self, ids: Vec<Value>) -> MutationResult<()> {
        self.ensure_unresolved()?;
        self.phase = Phase::Resolved(ids);
        Ok(())
    }

    pub fn resolved_ids(&self) -> Option<&[Value]> {
        match &self.phase {
            Phase::Resolved(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.phase, Phase::Resolved(_))
    }

    /// Emit the select statement with ids substituted. Callable once.
    pub fn fmt_select_statement(&mut self) -> MutationResult<Statement> {
        let ids = match std::mem::replace(&mut self.phase, Phase::Consumed) {
            Phase::Resolved(ids) => ids,
            other => {
                let err = match other {
                    Phase::Unresolved => MutationError::IdsNotResolved,
                    Phase::Failed => MutationError::Poisoned,
                    _ => MutationError::AlreadyConsumed,
                };
                self.phase = other;
                return Err(err);
            }
        };

        let encoded = Value::Array(ids).to_string();
        let parameters = self
            .select
            .parameters
            .iter()
            .map(|p| {
                if p.is_text(IDS_PLACEHOLDER) {
                    Param::text(encoded.clone())
                } else {
                    p.clone()
                }
            })
            .collect();
        Ok(Statement::new(self.select.query.clone(), parameters))
    }

    fn ensure_unresolved(&self) -> MutationResult<()> {
        match self.phase {
            Phase::Unresolved => Ok(()),
            Phase::Failed => Err(MutationError::Poisoned),
            Phase::Resolved(_) => Err(MutationError::AlreadyResolved),
            Phase::Consumed => Err(MutationError::AlreadyConsumed),
        }
    }
}
