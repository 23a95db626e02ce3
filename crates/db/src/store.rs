//! `PgStore` — the Postgres implementation of `orchestrator::ports::Store`.
//!
//! Thin adapter: converts domain types to/from the JSONB-backed row structs
//! in `models` and delegates to `repository`.

use std::collections::HashMap;

use async_trait::async_trait;
use mandates::Mandate;
use orchestrator::{
    Execution, ExecutionPatch, ExecutionStatus, OrchestratorError, Store,
};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{AuditRow, ExecutionRow, MandateRow};
use crate::repository::{agents, audit, executions, mandates as mandate_repo};
use crate::DbPool;

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn status_to_string(status: ExecutionStatus) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "RUNNING".to_string())
}

fn status_from_string(s: &str) -> Result<ExecutionStatus, OrchestratorError> {
    serde_json::from_value(Value::String(s.to_string()))
        .map_err(|e| OrchestratorError::StoreUnavailable(format!("bad execution status '{s}': {e}")))
}

fn execution_to_row(execution: &Execution) -> Result<ExecutionRow, OrchestratorError> {
    Ok(ExecutionRow {
        id: execution.execution_id,
        agent_id: execution.agent_id.clone(),
        tenant_id: execution.tenant_id.clone(),
        status: status_to_string(execution.status),
        started_at: execution.started_at,
        ended_at: execution.ended_at,
        context: execution.context.clone(),
        variables: Value::Object(
            execution.variables.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        ),
        step_results: serde_json::to_value(&execution.step_results)
            .map_err(|e| OrchestratorError::StoreUnavailable(e.to_string()))?,
        mandate_chain_id: execution.mandate_chain_id.clone(),
        metrics: execution
            .metrics
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| OrchestratorError::StoreUnavailable(e.to_string()))?,
        failure_reason: execution
            .failure_reason
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| OrchestratorError::StoreUnavailable(e.to_string()))?,
    })
}

fn row_to_execution(row: ExecutionRow) -> Result<Execution, OrchestratorError> {
    let status = status_from_string(&row.status)?;
    let step_results = serde_json::from_value(row.step_results)
        .map_err(|e| OrchestratorError::StoreUnavailable(e.to_string()))?;
    let variables: HashMap<String, Value> =
        row.variables.as_object().cloned().unwrap_or_default().into_iter().collect();
    let metrics = row.metrics.and_then(|v| serde_json::from_value(v).ok());
    let failure_reason = row.failure_reason.and_then(|v| serde_json::from_value(v).ok());

    Ok(Execution {
        execution_id: row.id,
        agent_id: row.agent_id,
        tenant_id: row.tenant_id,
        started_at: row.started_at,
        ended_at: row.ended_at,
        status,
        context: row.context,
        variables,
        step_results,
        mandate_chain_id: row.mandate_chain_id,
        metrics,
        failure_reason,
    })
}

fn mandate_to_row(mandate: &Mandate) -> Result<MandateRow, OrchestratorError> {
    Ok(MandateRow {
        mandate_id: mandate.mandate_id.clone(),
        chain_id: mandate.chain_id.clone(),
        sequence: mandate.sequence as i32,
        kind: serde_json::to_value(mandate.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default(),
        status: serde_json::to_value(mandate.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default(),
        content: mandate.content.clone(),
        prev_hash: mandate.prev_hash.clone(),
        hash: mandate.hash.clone(),
        signatures: serde_json::to_value(&mandate.signatures)
            .map_err(|e| OrchestratorError::Mandate(e.to_string()))?,
        created_at: mandate.created_at,
    })
}

fn row_to_mandate(row: MandateRow) -> Result<Mandate, OrchestratorError> {
    let kind = serde_json::from_value(Value::String(row.kind))
        .map_err(|e| OrchestratorError::Mandate(e.to_string()))?;
    let status = serde_json::from_value(Value::String(row.status))
        .map_err(|e| OrchestratorError::Mandate(e.to_string()))?;
    let signatures = serde_json::from_value(row.signatures)
        .map_err(|e| OrchestratorError::Mandate(e.to_string()))?;

    Ok(Mandate {
        mandate_id: row.mandate_id,
        chain_id: row.chain_id,
        sequence: row.sequence as u32,
        kind,
        status,
        content: row.content,
        prev_hash: row.prev_hash,
        hash: row.hash,
        signatures,
        created_at: row.created_at,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn load_agent(&self, agent_id: &str) -> Result<Option<Value>, OrchestratorError> {
        let row = agents::get_agent(&self.pool, agent_id).await?;
        Ok(row.map(|r| r.workflow_definition))
    }

    async fn save_execution(&self, execution: &Execution) -> Result<(), OrchestratorError> {
        let row = execution_to_row(execution)?;
        executions::create_execution(&self.pool, &row).await?;
        Ok(())
    }

    async fn update_execution(&self, execution_id: Uuid, patch: ExecutionPatch) -> Result<(), OrchestratorError> {
        let Some(mut row) = executions::get_execution(&self.pool, execution_id).await? else {
            return Err(OrchestratorError::ExecutionNotFound(execution_id.to_string()));
        };

        if let Some(status) = patch.status {
            row.status = status_to_string(status);
        }
        if let Some(ended_at) = patch.ended_at {
            row.ended_at = Some(ended_at);
        }
        if let Some(step_result) = patch.append_step_result {
            let mut results: Vec<orchestrator::StepResult> = serde_json::from_value(row.step_results.clone())
                .map_err(|e| OrchestratorError::StoreUnavailable(e.to_string()))?;
            results.push(step_result);
            row.step_results = serde_json::to_value(results)
                .map_err(|e| OrchestratorError::StoreUnavailable(e.to_string()))?;
        }
        if let Some(variables) = patch.variables {
            row.variables = variables;
        }
        if let Some(chain_id) = patch.mandate_chain_id {
            row.mandate_chain_id = Some(chain_id);
        }
        if let Some(metrics) = patch.metrics {
            row.metrics = Some(
                serde_json::to_value(metrics).map_err(|e| OrchestratorError::StoreUnavailable(e.to_string()))?,
            );
        }
        if let Some(failure_reason) = patch.failure_reason {
            row.failure_reason = Some(
                serde_json::to_value(failure_reason)
                    .map_err(|e| OrchestratorError::StoreUnavailable(e.to_string()))?,
            );
        }

        executions::replace_execution(&self.pool, &row).await?;
        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<Execution>, OrchestratorError> {
        let row = executions::get_execution(&self.pool, execution_id).await?;
        row.map(row_to_execution).transpose()
    }

    async fn append_mandate(&self, mandate: &Mandate) -> Result<(), OrchestratorError> {
        let row = mandate_to_row(mandate)?;
        mandate_repo::append_mandate(&self.pool, &row).await?;
        Ok(())
    }

    async fn load_chain(&self, chain_id: &str) -> Result<Vec<Mandate>, OrchestratorError> {
        let rows = mandate_repo::load_chain(&self.pool, chain_id).await?;
        rows.into_iter().map(row_to_mandate).collect()
    }

    async fn append_audit(&self, entry: &orchestrator::AuditEntry) -> Result<(), OrchestratorError> {
        let row = AuditRow {
            id: Uuid::new_v4(),
            execution_id: entry.execution_id,
            kind: entry.kind.clone(),
            message: entry.message.clone(),
            ts: entry.ts,
        };
        audit::append_audit(&self.pool, &row).await?;
        Ok(())
    }
}
