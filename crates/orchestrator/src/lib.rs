//! `orchestrator` crate — the `Orchestrator` that drives a validated
//! `engine::Workflow` to completion (spec §4.3), built against the `Store`
//! and `EventBus` ports it defines in `ports` rather than depending on a
//! concrete persistence or pub/sub crate directly.

pub mod backoff;
pub mod condition;
pub mod config;
pub mod error;
pub mod eventbus;
pub mod models;
pub mod ports;
pub mod run;
pub mod template;

pub use config::OrchestratorConfig;
pub use error::OrchestratorError;
pub use eventbus::InMemoryEventBus;
pub use models::{
    AuditEntry, Execution, ExecutionContext, ExecutionStatus, FailureReason, Metrics, StepResult,
    StepStatus, TenantConstraints,
};
pub use ports::{Event, EventBus, EventKind, ExecutionPatch, Store, StepUpdatePayload};
pub use run::Orchestrator;
pub use template::VariableStore;
