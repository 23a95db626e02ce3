//! Engine-level error types (workflow validation + ordering).

use thiserror::Error;

/// Errors produced by `WorkflowEngine::validate`/`order`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("workflow has no steps")]
    EmptyWorkflow,

    #[error("workflow must have exactly one TRIGGER step, found {0}")]
    TriggerCount(usize),

    #[error("duplicate step id: '{0}'")]
    DuplicateStepId(String),

    #[error("step id must not be empty")]
    EmptyStepId,

    #[error("successor references unknown step '{step_id}' from '{from}'")]
    UnknownSuccessor { from: String, step_id: String },

    #[error("step '{0}' is unreachable from the trigger")]
    UnreachableStep(String),

    #[error("step '{step_id}' has an invalid template expression: {message}")]
    InvalidTemplate { step_id: String, message: String },

    #[error("step '{step_id}' timeout {timeout_ms}ms is out of range [{min}, {max}]")]
    TimeoutOutOfRange {
        step_id: String,
        timeout_ms: u64,
        min: u64,
        max: u64,
    },

    #[error("step '{step_id}' retry count {count} exceeds maximum of {max}")]
    RetryCountOutOfRange {
        step_id: String,
        count: u32,
        max: u32,
    },

    #[error("step '{0}' is not a CONDITION step but declares more than one successor")]
    MultipleSuccessorsOnNonCondition(String),

    #[error("workflow graph contains a cycle not attributable to a CONDITION loopback")]
    CycleDetected,
}
