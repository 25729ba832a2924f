//! Route handlers for the local control-plane REST surface.

use std::process;

use actix_web::{web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::config::constants::PROTOCOL_VERSION;
use crate::transfer::{DownloadState, Transfer, TransferKind, UploadState, UserData};

use super::dto::{CreateDownloadRequest, CreateUploadRequest, SetStatusRequest};
use super::error::{Error, Result};
use super::AppState;

pub async fn create_upload(
    state: web::Data<AppState>,
    user_data: UserData,
    body: web::Json<CreateUploadRequest>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let job_id = Uuid::new_v4().to_string();

    let mut upload = UploadState::new(body.local_file_path.into(), job_id, body.job_information);
    let work_orders = upload.initialize().await?;

    let mut transfer = Transfer::new(body.metadata, user_data, TransferKind::Upload(upload));
    transfer.work_orders = work_orders;
    transfer.start();

    let id = state.manager.add(transfer).await;
    Ok(HttpResponse::Ok().json(id))
}

pub async fn create_download(
    state: web::Data<AppState>,
    user_data: UserData,
    body: web::Json<CreateDownloadRequest>,
) -> Result<HttpResponse> {
    let body = body.into_inner();

    let download = DownloadState::new(body.local_dir_path.into(), body.job_id);
    let work_orders = download
        .initialize(state.queue_manager.as_ref(), &state.r2_base_url, &user_data)
        .await?;

    let mut transfer = Transfer::new(body.metadata, user_data, TransferKind::Download(download));
    transfer.work_orders = work_orders;
    transfer.start();

    let id = state.manager.add(transfer).await;
    Ok(HttpResponse::Ok().json(id))
}

pub async fn get_all_transfers(state: web::Data<AppState>) -> HttpResponse {
    let summaries = state
        .manager
        .with_all_in_order(|transfers| {
            transfers
                .iter()
                .map(|t| serde_json::to_value(t.to_summary()).expect("transfer summary always serializes"))
                .collect::<Vec<_>>()
        })
        .await;
    HttpResponse::Ok().json(summaries)
}

pub async fn get_transfer(state: web::Data<AppState>, id: web::Path<Uuid>) -> Result<HttpResponse> {
    let id = id.into_inner();
    let detail = state
        .manager
        .with_transfer(id, |t| serde_json::to_value(t.to_detail()).expect("transfer detail always serializes"))
        .await
        .ok_or(Error::TransferNotFound(id))?;
    Ok(HttpResponse::Ok().json(detail))
}

pub async fn delete_transfer(state: web::Data<AppState>, id: web::Path<Uuid>) -> HttpResponse {
    let removed = state.manager.remove(id.into_inner()).await;
    HttpResponse::Ok().json(removed)
}

pub async fn set_transfer_status(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
    body: web::Json<SetStatusRequest>,
) -> Result<HttpResponse> {
    let id = id.into_inner();
    let applied = match body.status.as_str() {
        "running" => state.manager.with_transfer_mut(id, Transfer::start).await,
        "paused" => state.manager.with_transfer_mut(id, Transfer::pause).await,
        "failure" => state.manager.with_transfer_mut(id, Transfer::stop).await,
        other => return Err(Error::UnsupportedStatus(other.to_owned())),
    };
    match applied {
        Some(()) => Ok(HttpResponse::Ok().json(true)),
        None => Ok(HttpResponse::NotFound().json(false)),
    }
}

pub async fn transfer_manager_info() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "service": "transfer_manager",
        "version": PROTOCOL_VERSION,
        "process_id": process::id(),
    }))
}

/// Returns the trailing `LOG_TAIL_BYTES` of the rolling log file, trimmed to
/// a whole-line boundary so a UI doesn't render a truncated first line.
pub async fn logs() -> HttpResponse {
    let path = std::env::temp_dir().join(crate::config::constants::LOG_FILE_NAME);
    let bytes = tokio::fs::read(&path).await.unwrap_or_default();
    let tail_start = bytes.len().saturating_sub(crate::config::constants::LOG_TAIL_BYTES);
    let tail = &bytes[tail_start..];
    let tail = match tail.iter().position(|b| *b == b'\n') {
        Some(first_newline) if tail_start > 0 => &tail[first_newline + 1..],
        _ => tail,
    };
    let contents = String::from_utf8_lossy(tail).into_owned();
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(contents)
}

pub async fn queues(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "download": state.download_queue.worker_speeds(),
        "upload": state.upload_queue.worker_speeds(),
    }))
}
