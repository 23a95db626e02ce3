//! `InMemoryStore` — a `Store` implementation backed by a `Mutex<HashMap>`,
//! used by the CLI's offline `run` command and by orchestrator integration
//! tests so they don't need a live Postgres instance.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mandates::Mandate;
use orchestrator::{AuditEntry, Execution, ExecutionPatch, OrchestratorError, Store};
use serde_json::Value;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    agents: Mutex<HashMap<String, Value>>,
    executions: Mutex<HashMap<Uuid, Execution>>,
    mandates: Mutex<HashMap<String, Vec<Mandate>>>,
    audit: Mutex<Vec<AuditEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_agent(&self, agent_id: impl Into<String>, workflow_definition: Value) {
        self.agents.lock().unwrap().insert(agent_id.into(), workflow_definition);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn load_agent(&self, agent_id: &str) -> Result<Option<Value>, OrchestratorError> {
        Ok(self.agents.lock().unwrap().get(agent_id).cloned())
    }

    async fn save_execution(&self, execution: &Execution) -> Result<(), OrchestratorError> {
        self.executions.lock().unwrap().insert(execution.execution_id, execution.clone());
        Ok(())
    }

    async fn update_execution(&self, execution_id: Uuid, patch: ExecutionPatch) -> Result<(), OrchestratorError> {
        let mut executions = self.executions.lock().unwrap();
        let execution = executions
            .get_mut(&execution_id)
            .ok_or_else(|| OrchestratorError::ExecutionNotFound(execution_id.to_string()))?;

        if let Some(status) = patch.status {
            execution.status = status;
        }
        if let Some(ended_at) = patch.ended_at {
            execution.ended_at = Some(ended_at);
        }
        if let Some(step_result) = patch.append_step_result {
            execution.step_results.push(step_result);
        }
        if let Some(variables) = patch.variables {
            execution.variables = variables.as_object().cloned().unwrap_or_default().into_iter().collect();
        }
        if let Some(chain_id) = patch.mandate_chain_id {
            execution.mandate_chain_id = Some(chain_id);
        }
        if let Some(metrics) = patch.metrics {
            execution.metrics = Some(metrics);
        }
        if let Some(failure_reason) = patch.failure_reason {
            execution.failure_reason = Some(failure_reason);
        }
        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<Execution>, OrchestratorError> {
        Ok(self.executions.lock().unwrap().get(&execution_id).cloned())
    }

    async fn append_mandate(&self, mandate: &Mandate) -> Result<(), OrchestratorError> {
        self.mandates.lock().unwrap().entry(mandate.chain_id.clone()).or_default().push(mandate.clone());
        Ok(())
    }

    async fn load_chain(&self, chain_id: &str) -> Result<Vec<Mandate>, OrchestratorError> {
        Ok(self.mandates.lock().unwrap().get(chain_id).cloned().unwrap_or_default())
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), OrchestratorError> {
        self.audit.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemoryStore::new();
        let execution = Execution {
            execution_id: Uuid::new_v4(),
            agent_id: "agent-1".into(),
            tenant_id: "tenant-1".into(),
            started_at: chrono::Utc::now(),
            ended_at: None,
            status: orchestrator::ExecutionStatus::Running,
            context: json!({}),
            variables: HashMap::new(),
            step_results: Vec::new(),
            mandate_chain_id: None,
            metrics: None,
            failure_reason: None,
        };
        store.save_execution(&execution).await.unwrap();
        let loaded = store.load_execution(execution.execution_id).await.unwrap().unwrap();
        assert_eq!(loaded.agent_id, "agent-1");
    }

    #[tokio::test]
    async fn update_missing_execution_errors() {
        let store = InMemoryStore::new();
        let err = store
            .update_execution(Uuid::new_v4(), ExecutionPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::ExecutionNotFound(_)));
    }
}
