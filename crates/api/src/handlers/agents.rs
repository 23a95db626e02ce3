use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use db::repository::agents as agent_repo;
use engine::Workflow;
use serde_json::Value;

use crate::AppState;

#[derive(serde::Deserialize)]
pub struct CreateAgentDto {
    pub tenant_id: String,
    pub name: String,
    pub workflow: Value,
}

pub async fn list(
    State(state): State<AppState>,
    axum::extract::Query(params): axum::extract::Query<std::collections::HashMap<String, String>>,
) -> Result<Json<Vec<db::models::AgentRow>>, StatusCode> {
    let tenant_id = params.get("tenantId").cloned().unwrap_or_default();
    agent_repo::list_agents(&state.pool, &tenant_id)
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn get(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<db::models::AgentRow>, StatusCode> {
    match agent_repo::get_agent(&state.pool, &id).await {
        Ok(Some(row)) => Ok(Json(row)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateAgentDto>,
) -> Result<(StatusCode, Json<db::models::AgentRow>), StatusCode> {
    if serde_json::from_value::<Workflow>(payload.workflow.clone()).is_err() {
        return Err(StatusCode::BAD_REQUEST);
    }

    agent_repo::create_agent(&state.pool, &payload.tenant_id, &payload.name, payload.workflow)
        .await
        .map(|row| (StatusCode::CREATED, Json(row)))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
