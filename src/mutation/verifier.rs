//! Fail-closed check of the per-row constraint flag.

use crate::db::{truthy, Dialect, Row};

use super::errors::{MutationError, MutationResult};

/// Column a mutation emits when the row check can only run after the fact
pub const CONSTRAINT_FLAG_COLUMN: &str = "_subzero_check__constraint";

/// How a missing flag column is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagPolicy {
    /// Missing flag: the predicate was enforced inside the mutation
    Optional,
    /// Missing flag: the check never ran, reject
    Required,
}

impl FlagPolicy {
    /// Policy for a mutation on `dialect`.
    ///
    /// A flag is only demanded when the role has a row check on the target
    /// and the dialect cannot enforce it inside the mutation.
    pub fn for_dialect(dialect: Dialect, has_row_check: bool) -> Self {
        if has_row_check && !dialect.native_row_predicates() {
            FlagPolicy::Required
        } else {
            FlagPolicy::Optional
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintVerifier {
    policy: FlagPolicy,
}

impl ConstraintVerifier {
    pub fn new(policy: FlagPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FlagPolicy {
        self.policy
    }

    /// Accept all rows or none.
    ///
    /// One falsy (or, under [`FlagPolicy::Required`], missing) flag rejects
    /// the whole batch.
    pub fn verify(&self, rows: &[Row]) -> MutationResult<()> {
        for row in rows {
            let ok = match row.get(CONSTRAINT_FLAG_COLUMN) {
                Some(flag) => truthy(flag),
                None => self.policy == FlagPolicy::Optional,
            };
            if !ok {
                return Err(MutationError::constraint_failed());
            }
        }
        Ok(())
    }
}

impl Default for ConstraintVerifier {
    fn default() -> Self {
        Self::new(FlagPolicy::Optional)
    }
}
