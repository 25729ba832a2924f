//! Errors produced while initializing, running, or finalizing a transfer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transfer {0} not found")]
    NotFound(uuid::Uuid),

    #[error("local path does not exist: {0}")]
    LocalPathMissing(std::path::PathBuf),

    #[error("work order {0} exhausted its retry budget")]
    RetriesExhausted(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Client(#[from] crate::clients::Error),

    #[error("malformed job spec: {0}")]
    MalformedJobSpec(String),
}
