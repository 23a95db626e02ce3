//! Mandate chain persistence.

use sqlx::PgPool;

use crate::{models::MandateRow, DbError};

pub async fn append_mandate(pool: &PgPool, row: &MandateRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO mandates
            (mandate_id, chain_id, sequence, kind, status, content, prev_hash, hash, signatures, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(&row.mandate_id)
    .bind(&row.chain_id)
    .bind(row.sequence)
    .bind(&row.kind)
    .bind(&row.status)
    .bind(&row.content)
    .bind(&row.prev_hash)
    .bind(&row.hash)
    .bind(&row.signatures)
    .bind(row.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_chain(pool: &PgPool, chain_id: &str) -> Result<Vec<MandateRow>, DbError> {
    sqlx::query_as::<_, MandateRow>(
        r#"
        SELECT mandate_id, chain_id, sequence, kind, status, content, prev_hash, hash, signatures, created_at
        FROM mandates WHERE chain_id = $1 ORDER BY sequence ASC
        "#,
    )
    .bind(chain_id)
    .fetch_all(pool)
    .await
    .map_err(DbError::from)
}
