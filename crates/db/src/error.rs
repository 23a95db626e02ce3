//! Typed error type for the db crate.

use orchestrator::OrchestratorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("row not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// The `Store`/`EventBus` ports speak `OrchestratorError`; this is the one
/// place a persistence failure crosses that boundary.
impl From<DbError> for OrchestratorError {
    fn from(err: DbError) -> Self {
        OrchestratorError::StoreUnavailable(err.to_string())
    }
}
