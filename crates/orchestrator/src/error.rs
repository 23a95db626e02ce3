//! Error taxonomy for the orchestrator (spec §7).
//!
//! Every variant here maps to one of the *kinds* spec §7 names; the mapping
//! back to the execution's single `failureReason` happens in `kind()`.

use thiserror::Error;

use crate::models::FailureReason;

#[derive(Debug, Error, Clone)]
pub enum OrchestratorError {
    #[error("workflow validation failed: {0}")]
    Validation(String),

    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    #[error("tool '{0}' is already registered")]
    ToolConflict(String),

    #[error("step '{step_id}' tool execution failed: {message}")]
    ToolExecution { step_id: String, message: String },

    #[error("step '{step_id}' timed out after {timeout_ms}ms")]
    Timeout { step_id: String, timeout_ms: u64 },

    #[error("execution deadline exceeded")]
    ExecutionDeadlineExceeded,

    #[error("mandate chain error: {0}")]
    Mandate(String),

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("execution cancelled")]
    Cancelled,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("event bus unavailable: {0}")]
    EventBusUnavailable(String),

    #[error("execution '{0}' not found")]
    ExecutionNotFound(String),

    #[error("execution '{0}' is already in a terminal state")]
    AlreadyTerminal(String),
}

impl OrchestratorError {
    /// The kind name spec §7 refers to (not a Rust type name) — used to
    /// populate `FailureReason.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::ToolNotFound(_) => "ToolNotFound",
            Self::ToolConflict(_) => "ToolConflict",
            Self::ToolExecution { .. } => "ToolExecutionError",
            Self::Timeout { .. } => "Timeout",
            Self::ExecutionDeadlineExceeded => "ExecutionDeadlineExceeded",
            Self::Mandate(_) => "MandateIntegrityError",
            Self::ConstraintViolation(_) => "ConstraintViolation",
            Self::Cancelled => "Cancelled",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::EventBusUnavailable(_) => "EventBusUnavailable",
            Self::ExecutionNotFound(_) => "ExecutionNotFound",
            Self::AlreadyTerminal(_) => "AlreadyTerminal",
        }
    }

    pub fn step_id(&self) -> Option<String> {
        match self {
            Self::ToolExecution { step_id, .. } | Self::Timeout { step_id, .. } => Some(step_id.clone()),
            _ => None,
        }
    }

    pub fn into_failure_reason(self, attempts: Option<u32>) -> FailureReason {
        let step_id = self.step_id();
        FailureReason { kind: self.kind().to_string(), message: self.to_string(), step_id, attempts }
    }
}
