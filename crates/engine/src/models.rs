//! Core domain models for the workflow graph.
//!
//! These types are the source of truth for what a workflow looks like in
//! memory. They serialise to/from the JSON `definition` column of the
//! external `workflows` store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a workflow run is started. Kept for parity with trigger-kind steps;
/// the concrete dispatch (cron scheduling, webhook routing) lives outside
/// the core per spec §1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerKind {
    Manual,
    Webhook { path: String },
    Schedule { expression: String },
}

/// The vertex kind. Only `Condition` steps may have more than one outgoing
/// successor (engine validation rule 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepKind {
    Trigger,
    Action,
    Condition,
    Approval,
}

/// Per-step directive deciding what the orchestrator does on tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "UPPERCASE")]
pub enum ErrorPolicy {
    Stop,
    Continue,
    Retry { max_attempts: u32 },
    Rollback,
}

impl ErrorPolicy {
    /// Retry counts above 10 are rejected by validation (spec §3).
    pub const MAX_RETRY_ATTEMPTS: u32 = 10;
}

/// A single conditional branch: `expression -> target step id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalEdge {
    pub expression: String,
    pub target: String,
}

/// The three keyed outgoing edges a step may declare.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Successors {
    pub on_success: Option<String>,
    pub on_failure: Option<String>,
    #[serde(default)]
    pub conditional: Vec<ConditionalEdge>,
}

impl Successors {
    /// All successor step ids this step can statically reach, in a stable
    /// order (on_success, on_failure, then conditional targets in order).
    pub fn all_targets(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(s) = &self.on_success {
            out.push(s.as_str());
        }
        if let Some(f) = &self.on_failure {
            out.push(f.as_str());
        }
        for c in &self.conditional {
            out.push(c.target.as_str());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.on_success.is_some() as usize
            + self.on_failure.is_some() as usize
            + self.conditional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lower/upper bound on a step's timeout, per spec §3 (1s..=5min).
pub const MIN_STEP_TIMEOUT_MS: u64 = 1_000;
pub const MAX_STEP_TIMEOUT_MS: u64 = 5 * 60 * 1_000;

/// A single vertex in a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
    pub tool_id: String,
    /// Parameters passed to the tool. May contain `${path.with.dots}`
    /// template expressions resolved against the orchestrator's variable
    /// store (see `orchestrator::template`).
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub timeout_ms: u64,
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub successors: Successors,
}

/// A named, versioned directed graph belonging to a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub version: u32,
    pub trigger: TriggerKind,
    /// Workflow-level default variables, lowest-priority layer of the
    /// orchestrator's variable store (spec §4.3).
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
    pub steps: Vec<Step>,
    /// Runtime loop bound for CONDITION loopback iterations. Defaults to
    /// 100 per spec §4.1/§9, configurable per workflow.
    #[serde(default = "default_loop_bound")]
    pub loop_bound: u32,
    pub created_at: DateTime<Utc>,
}

fn default_loop_bound() -> u32 {
    100
}

impl Workflow {
    /// Convenience constructor for tests and the CLI's `validate` command.
    pub fn new(
        tenant_id: impl Into<String>,
        name: impl Into<String>,
        trigger: TriggerKind,
        steps: Vec<Step>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            version: 1,
            trigger,
            variables: serde_json::Map::new(),
            steps,
            loop_bound: default_loop_bound(),
            created_at: Utc::now(),
        }
    }

    pub fn trigger_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.kind == StepKind::Trigger)
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}
