use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use db::repository::agents as agent_repo;
use engine::Workflow;
use orchestrator::{Execution, ExecutionContext, TenantConstraints};
use serde_json::Value;

use crate::AppState;

#[derive(serde::Deserialize)]
pub struct ExecuteAgentDto {
    pub tenant_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub input: Value,
    #[serde(default)]
    pub initial_variables: Value,
    #[serde(default)]
    pub constraints: TenantConstraints,
}

pub async fn execute(
    Path(agent_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<ExecuteAgentDto>,
) -> Result<(StatusCode, Json<Execution>), StatusCode> {
    let row = agent_repo::get_agent(&state.pool, &agent_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let workflow: Workflow =
        serde_json::from_value(row.workflow_definition).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let context = ExecutionContext {
        tenant_id: payload.tenant_id,
        user_id: payload.user_id,
        constraints: payload.constraints,
        input: payload.input,
    };

    state
        .orchestrator
        .execute(&agent_id, &workflow, context, payload.initial_variables)
        .await
        .map(|execution| (StatusCode::OK, Json(execution)))
        .map_err(|e| {
            tracing::warn!(agent_id, error = %e, "execution failed");
            StatusCode::UNPROCESSABLE_ENTITY
        })
}
