//! Agent (workflow definition) CRUD.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::AgentRow, DbError};

pub async fn create_agent(
    pool: &PgPool,
    tenant_id: &str,
    name: &str,
    workflow_definition: serde_json::Value,
) -> Result<AgentRow, DbError> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    sqlx::query_as::<_, AgentRow>(
        r#"
        INSERT INTO agents (id, tenant_id, name, workflow_definition, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, tenant_id, name, workflow_definition, created_at
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .bind(name)
    .bind(workflow_definition)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(DbError::from)
}

pub async fn get_agent(pool: &PgPool, id: &str) -> Result<Option<AgentRow>, DbError> {
    let Ok(id) = id.parse::<Uuid>() else { return Ok(None) };
    sqlx::query_as::<_, AgentRow>(
        "SELECT id, tenant_id, name, workflow_definition, created_at FROM agents WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(DbError::from)
}

pub async fn list_agents(pool: &PgPool, tenant_id: &str) -> Result<Vec<AgentRow>, DbError> {
    sqlx::query_as::<_, AgentRow>(
        "SELECT id, tenant_id, name, workflow_definition, created_at FROM agents WHERE tenant_id = $1 ORDER BY created_at DESC",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await
    .map_err(DbError::from)
}

/// Unscoped listing used to resolve an inbound webhook path to its owning
/// agent, since a webhook request arrives with no tenant context of its own.
pub async fn list_all(pool: &PgPool) -> Result<Vec<AgentRow>, DbError> {
    sqlx::query_as::<_, AgentRow>(
        "SELECT id, tenant_id, name, workflow_definition, created_at FROM agents ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await
    .map_err(DbError::from)
}
