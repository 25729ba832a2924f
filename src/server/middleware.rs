//! Control-plane middleware: CORS, the version gate, and per-request
//! `UserData` extraction from headers.

use std::future::{ready, Ready};

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::HeaderName;
use actix_web::middleware::Next;
use actix_web::{dev, web, Error as ActixError, FromRequest, HttpRequest, ResponseError};

use crate::config::constants::PROTOCOL_VERSION;
use crate::config::Config;
use crate::transfer::UserData;

use super::error::Error;

const VERSION_HEADER: &str = "Transfer-Manager-Version";

/// Permissive CORS matching the control plane's single consumer (a local UI
/// panel running from an arbitrary dev-server origin): any origin, any
/// method, any header, a 300 s preflight cache.
pub fn cors() -> actix_cors::Cors {
    actix_cors::Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(300)
}

/// Rejects requests carrying a `Transfer-Manager-Version` header that
/// doesn't match this build, with 412. Requests that omit the header are
/// always let through - the gate only fires when a caller asserts a version.
pub async fn version_gate<B: MessageBody + 'static>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, ActixError> {
    let requested = req
        .headers()
        .get(HeaderName::from_static("transfer-manager-version"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    if let Some(requested) = requested {
        if requested != PROTOCOL_VERSION {
            let error = Error::VersionMismatch {
                requested,
                running: PROTOCOL_VERSION.to_owned(),
            };
            let response = error.error_response().map_into_left_body();
            return Ok(req.into_response(response));
        }
    }

    next.call(req).await.map(ServiceResponse::map_into_right_body)
}

impl FromRequest for UserData {
    type Error = ActixError;
    type Future = Ready<Result<Self, ActixError>>;

    /// Builds `UserData` from the `farm_host` / `api_token` / `qm_auth_token`
    /// request headers, falling back to the process-wide default farm host
    /// when the header is missing or empty.
    fn from_request(req: &HttpRequest, _payload: &mut dev::Payload) -> Self::Future {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
        };

        let config = req
            .app_data::<web::Data<Config>>()
            .expect("Config must be registered as app_data");

        ready(Ok(UserData::from_headers(
            config,
            header("farm_host"),
            header("api_token"),
            header("qm_auth_token"),
        )))
    }
}
