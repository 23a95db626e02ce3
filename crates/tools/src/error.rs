//! Error types for the `tools` crate.
//!
//! Unlike the teacher's `nodes::NodeError` (which distinguishes
//! `Retryable`/`Fatal` at the node level), recovery here is entirely the
//! *step's* concern (spec §4.3/§7: "ToolExecutionError — tool rejected or
//! threw; recoverable per step policy"). A tool only ever reports that it
//! failed; the orchestrator's error policy decides whether that is retried,
//! continued past, or treated as fatal.

use thiserror::Error;

/// Errors returned by a tool's `execute`/`rollback`.
#[derive(Debug, Error, Clone)]
pub enum ToolError {
    #[error("tool '{tool_id}' failed: {message}")]
    Failed { tool_id: String, message: String },

    #[error("tool '{tool_id}' rejected parameters: {message}")]
    InvalidParameters { tool_id: String, message: String },

    #[error("tool '{tool_id}' rollback failed: {message}")]
    RollbackFailed { tool_id: String, message: String },
}

impl ToolError {
    pub fn failed(tool_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed { tool_id: tool_id.into(), message: message.into() }
    }
}

/// Errors from registry-level operations (register/get/validate).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    ToolConflict(String),

    #[error("tool '{0}' not found")]
    NotFound(String),
}
