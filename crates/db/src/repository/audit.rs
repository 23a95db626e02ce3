//! Audit log persistence.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::AuditRow, DbError};

pub async fn append_audit(pool: &PgPool, row: &AuditRow) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO audit_log (id, execution_id, kind, message, ts) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(row.id)
    .bind(row.execution_id)
    .bind(&row.kind)
    .bind(&row.message)
    .bind(row.ts)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_for_execution(pool: &PgPool, execution_id: Uuid) -> Result<Vec<AuditRow>, DbError> {
    sqlx::query_as::<_, AuditRow>(
        "SELECT id, execution_id, kind, message, ts FROM audit_log WHERE execution_id = $1 ORDER BY ts ASC",
    )
    .bind(execution_id)
    .fetch_all(pool)
    .await
    .map_err(DbError::from)
}
