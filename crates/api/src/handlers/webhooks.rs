use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use db::repository::agents as agent_repo;
use engine::{TriggerKind, Workflow};
use orchestrator::{ExecutionContext, TenantConstraints};
use serde_json::Value;

use crate::AppState;

/// Finds the agent whose workflow trigger is bound to `path` and starts a
/// run against it. Inbound requests carry no tenant, so agents are scanned
/// across all tenants and the match is resolved by trigger path alone.
pub async fn handle_webhook(
    Path(path): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let agents = agent_repo::list_all(&state.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let matched = agents.into_iter().find_map(|row| {
        let workflow: Workflow = serde_json::from_value(row.workflow_definition.clone()).ok()?;
        match &workflow.trigger {
            TriggerKind::Webhook { path: trigger_path } if trigger_path == &path => {
                Some((row, workflow))
            }
            _ => None,
        }
    });

    let (row, workflow) = matched.ok_or(StatusCode::NOT_FOUND)?;

    let context = ExecutionContext {
        tenant_id: row.tenant_id.clone(),
        user_id: None,
        constraints: TenantConstraints::default(),
        input: payload,
    };

    let execution = state
        .orchestrator
        .execute(&row.id.to_string(), &workflow, context, Value::Null)
        .await
        .map_err(|e| {
            tracing::warn!(path, error = %e, "webhook-triggered execution failed");
            StatusCode::UNPROCESSABLE_ENTITY
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "execution_id": execution.execution_id, "status": execution.status })),
    ))
}
