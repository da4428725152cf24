//! Facade-level failures (§7): everything else still returns `Outcome`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("system is not operational; awaiting explicit reinitialization")]
    NotOperational,
    #[error("operation exceeded the {0}ms hard ceiling")]
    Timeout(u64),
    #[error(transparent)]
    Store(#[from] signalbox_store::StoreError),
}
