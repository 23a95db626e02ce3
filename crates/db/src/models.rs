//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types live in the `orchestrator` and `mandates` crates; the
//! repository functions in `repository` convert row <-> domain type at the
//! boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted agent row: an agent id plus the workflow definition it runs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentRow {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub workflow_definition: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A persisted execution row. `step_results`, `metrics`, `variables`, and
/// `failure_reason` are stored as JSONB rather than normalized tables —
/// they are always read and written as a whole alongside the execution.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionRow {
    pub id: Uuid,
    pub agent_id: String,
    pub tenant_id: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub context: serde_json::Value,
    pub variables: serde_json::Value,
    pub step_results: serde_json::Value,
    pub mandate_chain_id: Option<String>,
    pub metrics: Option<serde_json::Value>,
    pub failure_reason: Option<serde_json::Value>,
}

/// A persisted mandate row, one per hash-linked chain entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MandateRow {
    pub mandate_id: String,
    pub chain_id: String,
    pub sequence: i32,
    pub kind: String,
    pub status: String,
    pub content: serde_json::Value,
    pub prev_hash: String,
    pub hash: String,
    pub signatures: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A persisted audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub kind: String,
    pub message: String,
    pub ts: DateTime<Utc>,
}
