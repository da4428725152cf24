//! Store Gateway failure modes (§4.1, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("NOT_FOUND: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("CONNECTION_LOST: {0}")]
    ConnectionLost(String),

    #[error("TIMEOUT_EXCEEDED: {0}")]
    TimeoutExceeded(String),

    #[error("INTEGRITY_VIOLATION: {0}")]
    IntegrityViolation(String),

    #[error("PROCEDURE_REJECTED: {0}")]
    ProcedureRejected(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        classify_sqlx_error(err)
    }
}

fn classify_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound { entity: "row", id: "unknown".into() },
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::TimeoutExceeded(err.to_string()),
        sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => StoreError::ConnectionLost(err.to_string()),
        sqlx::Error::Database(db_err) => StoreError::ProcedureRejected(db_err.message().to_string()),
        other => StoreError::ProcedureRejected(other.to_string()),
    }
}
