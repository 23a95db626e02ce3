//! Abstract ports the Orchestrator is built against (spec §6): `Store` and
//! `EventBus`. Concrete implementations (Postgres, in-memory) live outside
//! this crate — `db` for `Store`, `orchestrator::eventbus` for the in-memory
//! `EventBus` used by tests and the CLI's offline path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mandates::Mandate;
use serde_json::Value;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::models::{AuditEntry, Execution, FailureReason, Metrics, StepResult};

/// A partial update to an in-flight `Execution`. `None` fields are left
/// untouched — mirrors the teacher's `update_execution_status` narrowing
/// generalized to every field an execution can mutate after creation.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPatch {
    pub status: Option<crate::models::ExecutionStatus>,
    pub ended_at: Option<DateTime<Utc>>,
    pub append_step_result: Option<StepResult>,
    pub variables: Option<Value>,
    pub mandate_chain_id: Option<String>,
    pub metrics: Option<Metrics>,
    pub failure_reason: Option<FailureReason>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn load_agent(&self, agent_id: &str) -> Result<Option<Value>, OrchestratorError>;
    async fn save_execution(&self, execution: &Execution) -> Result<(), OrchestratorError>;
    async fn update_execution(&self, execution_id: Uuid, patch: ExecutionPatch) -> Result<(), OrchestratorError>;
    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<Execution>, OrchestratorError>;
    async fn append_mandate(&self, mandate: &Mandate) -> Result<(), OrchestratorError>;
    async fn load_chain(&self, chain_id: &str) -> Result<Vec<Mandate>, OrchestratorError>;
    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), OrchestratorError>;
}

/// What gets published for `step:update` (spec §6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct StepUpdatePayload {
    pub execution_id: Uuid,
    pub step_id: String,
    pub status: crate::models::StepStatus,
    pub attempts: u32,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionCancelled,
    StepUpdate,
}

impl EventKind {
    /// Topic string per spec §6: `agent:<agentId>:execution:started`, etc.
    pub fn topic(self, agent_id: &str) -> String {
        let suffix = match self {
            Self::ExecutionStarted => "execution:started",
            Self::ExecutionCompleted => "execution:completed",
            Self::ExecutionFailed => "execution:failed",
            Self::ExecutionCancelled => "execution:cancelled",
            Self::StepUpdate => "step:update",
        };
        format!("agent:{agent_id}:{suffix}")
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub topic: String,
    pub agent_id: String,
    pub execution_id: Uuid,
    pub payload: Value,
    pub ts: DateTime<Utc>,
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, kind: EventKind, agent_id: &str, execution_id: Uuid, payload: Value) -> Result<(), OrchestratorError>;
}
