//! The local control-plane HTTP server: binds loopback only, exposes the
//! REST surface a UI panel drives transfers through.

mod dto;
mod error;
mod middleware;
mod routes;

pub use error::{Error, Result};

use std::sync::Arc;

use actix_web::{web, App, HttpServer};

use crate::clients::{QueueManager, R2Worker};
use crate::config::Config;
use crate::transfer::{TransferManager, TransferQueue};

/// Everything a route handler needs, registered once as `web::Data<AppState>`.
pub struct AppState {
    pub manager: Arc<TransferManager>,
    pub upload_queue: Arc<TransferQueue>,
    pub download_queue: Arc<TransferQueue>,
    pub queue_manager: Arc<QueueManager>,
    pub r2: Arc<R2Worker>,
    pub r2_base_url: String,
}

/// Registers the `/api` scope - routes plus the CORS and version-gate
/// middleware - onto a `ServiceConfig`. Shared by `run` and by integration
/// tests that drive the app in-process via `actix_web::test`, so the two
/// never drift apart.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // `.wrap()` layers outside-in in reverse registration order, so
            // CORS (registered last) sees the request before the version gate.
            .wrap(actix_web::middleware::from_fn(middleware::version_gate))
            .wrap(middleware::cors())
            .route("/upload", web::post().to(routes::create_upload))
            .route("/download", web::post().to(routes::create_download))
            .route("/transfers", web::get().to(routes::get_all_transfers))
            .route("/transfers/{id}", web::get().to(routes::get_transfer))
            .route("/transfers/{id}", web::delete().to(routes::delete_transfer))
            .route("/transfers/{id}/status", web::put().to(routes::set_transfer_status))
            .route("/transfer_manager_info", web::get().to(routes::transfer_manager_info))
            .route("/logs", web::get().to(routes::logs))
            .route("/queues", web::get().to(routes::queues)),
    );
}

/// Binds and runs the control-plane server on `127.0.0.1:{config.control_plane_port}`
/// until the process is asked to shut down. `UserData` is pulled from
/// headers per-request by handlers that declare it as an extractor
/// argument, not as middleware - see `middleware::FromRequest for UserData`.
pub async fn run(config: Config, state: AppState) -> std::io::Result<()> {
    let port = config.control_plane_port;
    let state = web::Data::new(state);
    let config_data = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(config_data.clone())
            .configure(configure)
    })
    .bind(("127.0.0.1", port))?
    .run()
    .await
}
