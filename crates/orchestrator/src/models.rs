//! Execution-side data model (spec §3: Execution, StepResult, + the ambient
//! TenantConstraints/AuditEntry SPEC_FULL adds).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl StepResult {
    pub fn pending(step_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Pending,
            started_at: now,
            ended_at: None,
            attempts: 0,
            output: None,
            error: None,
        }
    }
}

/// Single `failureReason` record every terminal execution carries (spec §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: String,
    pub message: String,
    pub step_id: Option<String>,
    pub attempts: Option<u32>,
}

/// Tenant-level limits the orchestrator enforces while running a workflow
/// (spec §1: "enforcing tenant-level constraints (budget, geo, approval)").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantConstraints {
    pub budget_ceiling: Option<f64>,
    pub allowed_geos: Option<Vec<String>>,
    pub require_approval: bool,
    /// Mirrors `constraints.timeLimit.maxExecutionTime` from spec §5.
    pub max_execution_time_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub constraints: TenantConstraints,
    pub input: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_steps: u32,
    pub completed_steps: u32,
    pub failed_steps: u32,
    pub duration_ms: u64,
    pub cost_accumulated: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub execution_id: Uuid,
    pub agent_id: String,
    pub tenant_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub context: Value,
    pub variables: HashMap<String, Value>,
    pub step_results: Vec<StepResult>,
    pub mandate_chain_id: Option<String>,
    pub metrics: Option<Metrics>,
    pub failure_reason: Option<FailureReason>,
}

/// A lightweight audit record appended alongside StepResults for every
/// policy decision (spec §2 names "audit entries"; §3 never defines the
/// shape — this is SPEC_FULL's ambient addition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub execution_id: Uuid,
    pub kind: String,
    pub message: String,
    pub ts: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(execution_id: Uuid, kind: impl Into<String>, message: impl Into<String>, ts: DateTime<Utc>) -> Self {
        Self { execution_id, kind: kind.into(), message: message.into(), ts }
    }
}
