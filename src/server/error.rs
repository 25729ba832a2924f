//! Errors the control-plane HTTP layer can return directly to a caller.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transfer {0} not found")]
    TransferNotFound(uuid::Uuid),

    #[error("unsupported status {0:?}")]
    UnsupportedStatus(String),

    #[error("you requested version {requested} but this is version {running}")]
    VersionMismatch { requested: String, running: String },

    #[error(transparent)]
    Transfer(#[from] crate::transfer::Error),
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::TransferNotFound(_) => StatusCode::NOT_FOUND,
            Error::UnsupportedStatus(_) => StatusCode::BAD_REQUEST,
            Error::VersionMismatch { .. } => StatusCode::PRECONDITION_FAILED,
            Error::Transfer(crate::transfer::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Error::Transfer(crate::transfer::Error::LocalPathMissing(_)) => StatusCode::BAD_REQUEST,
            Error::Transfer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
