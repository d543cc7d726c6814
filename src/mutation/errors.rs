//! # Mutation Errors
//!
//! Failures of the two-phase mutate-then-select protocol.

use thiserror::Error;

/// Result type for mutation coordination
pub type MutationResult<T> = Result<T, MutationError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError {
    // ==================
    // Permission Errors
    // ==================
    /// A mutated row failed its row-level check
    #[error("Permission denied")]
    PermissionDenied { description: String },

    // ==================
    // Contract Violations (fatal)
    // ==================
    /// Select phase requested before mutated ids were captured
    #[error("ids of the mutated rows are not set")]
    IdsNotResolved,

    /// Mutated rows delivered twice
    #[error("mutated rows were already set")]
    AlreadyResolved,

    /// Select statement requested a second time
    #[error("select statement was already emitted")]
    AlreadyConsumed,

    /// Coordinator used after a permission failure
    #[error("statement is unusable after a failed permission check")]
    Poisoned,
}

impl MutationError {
    pub(crate) fn constraint_failed() -> Self {
        MutationError::PermissionDenied {
            description: "check constraint of an insert/update permission has failed".to_string(),
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            MutationError::PermissionDenied { .. } => 403,
            _ => 500,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            MutationError::PermissionDenied { description } => Some(description),
            _ => None,
        }
    }

    /// Contract violations are caller bugs and never retried
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MutationError::PermissionDenied { .. })
    }
}
