//! Crate-wide error type.
//!
//! Individual modules define their own `Error`/`Result` pair (see
//! `transfer::Error`, `server::Error`, `clients::Error`) following the
//! teacher's per-module convention. This type aggregates them for use at the
//! outermost edges of the binary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transfer(#[from] crate::transfer::Error),

    #[error(transparent)]
    Server(#[from] crate::server::Error),

    #[error(transparent)]
    Clients(#[from] crate::clients::Error),

    #[error(transparent)]
    Config(#[from] crate::config::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
