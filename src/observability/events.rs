//! Observable events for the gateway
//!
//! Events are explicit and typed; every log line names one.

use std::fmt;

/// Lifecycle points worth a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Bootstrap
    /// Introspection query about to run
    IntrospectionStart,
    /// Schema parsed and accepted
    SchemaLoaded,
    /// Introspection failed, will retry after a delay
    SchemaRetry,
    /// Introspection failed for good
    SchemaLoadFailed,

    // Requests
    /// Request accepted for processing
    RequestStart,
    /// Response produced
    RequestComplete,
    /// Request ended with an error
    RequestFailed,

    // Statements
    /// Statement sent to the driver
    StatementExecuted,
    /// Mutation phase of a two-phase write
    MutatePhase,
    /// Select phase of a two-phase write
    SelectPhase,
    /// Row-level check rejected a write
    PermissionDenied,
    /// Transaction rolled back
    Rollback,
}

impl Event {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::IntrospectionStart => "INTROSPECTION_START",
            Event::SchemaLoaded => "SCHEMA_LOADED",
            Event::SchemaRetry => "SCHEMA_RETRY",
            Event::SchemaLoadFailed => "SCHEMA_LOAD_FAILED",
            Event::RequestStart => "REQUEST_START",
            Event::RequestComplete => "REQUEST_COMPLETE",
            Event::RequestFailed => "REQUEST_FAILED",
            Event::StatementExecuted => "STATEMENT_EXECUTED",
            Event::MutatePhase => "MUTATE_PHASE",
            Event::SelectPhase => "SELECT_PHASE",
            Event::PermissionDenied => "PERMISSION_DENIED",
            Event::Rollback => "ROLLBACK",
        }
    }

    /// Whether the event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::SchemaLoadFailed | Event::RequestFailed | Event::PermissionDenied
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
