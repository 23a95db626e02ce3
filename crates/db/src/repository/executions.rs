//! Execution repository functions.
//!
//! `update_execution` is read-modify-write rather than a single dynamic
//! `UPDATE ... SET` built from whichever `ExecutionPatch` fields are
//! present — the patch can touch up to six independent columns including
//! an append onto the `step_results` JSONB array, and building that as one
//! statement would trade a single extra round trip for a hand-rolled SQL
//! builder. The chain lock in `mandates` protects cross-mandate ordering;
//! a single execution's own updates are always driven by its one owning
//! orchestrator task, so there is no concurrent-writer race to guard here.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::ExecutionRow, DbError};

pub async fn create_execution(pool: &PgPool, row: &ExecutionRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO executions
            (id, agent_id, tenant_id, status, started_at, ended_at, context, variables,
             step_results, mandate_chain_id, metrics, failure_reason)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(row.id)
    .bind(&row.agent_id)
    .bind(&row.tenant_id)
    .bind(&row.status)
    .bind(row.started_at)
    .bind(row.ended_at)
    .bind(&row.context)
    .bind(&row.variables)
    .bind(&row.step_results)
    .bind(&row.mandate_chain_id)
    .bind(&row.metrics)
    .bind(&row.failure_reason)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_execution(pool: &PgPool, id: Uuid) -> Result<Option<ExecutionRow>, DbError> {
    sqlx::query_as::<_, ExecutionRow>(
        r#"
        SELECT id, agent_id, tenant_id, status, started_at, ended_at, context, variables,
               step_results, mandate_chain_id, metrics, failure_reason
        FROM executions WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(DbError::from)
}

pub async fn replace_execution(pool: &PgPool, row: &ExecutionRow) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE executions
        SET status = $2, ended_at = $3, variables = $4, step_results = $5,
            mandate_chain_id = $6, metrics = $7, failure_reason = $8
        WHERE id = $1
        "#,
    )
    .bind(row.id)
    .bind(&row.status)
    .bind(row.ended_at)
    .bind(&row.variables)
    .bind(&row.step_results)
    .bind(&row.mandate_chain_id)
    .bind(&row.metrics)
    .bind(&row.failure_reason)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
