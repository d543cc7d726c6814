//! Two-phase mutation protocol and its permission gate.

mod errors;
mod mysql_ids;
mod two_phase;
mod verifier;

pub use errors::{MutationError, MutationResult};
pub use mysql_ids::{ids_from_rows, recover_ids, IdRecovery, SURVIVING_IDS_QUERY};
pub use two_phase::{TwoStepStatement, IDS_PLACEHOLDER};
pub use verifier::{ConstraintVerifier, FlagPolicy, CONSTRAINT_FLAG_COLUMN};
