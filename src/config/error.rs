//! Configuration-related errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid port in {var}: {value}")]
    InvalidPort { var: &'static str, value: String },
}
