//! The loop a `QueueWorker` runs: pull a work order, execute it end to end
//! with retries and pause checks, report the outcome, repeat until
//! cancelled.

use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use log::{info, warn};
use log_mdc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::constants::{
    DOWNLOAD_RETRY_INTERVAL_SECS, QUEUE_IDLE_POLL_SECS, UPLOAD_CHUNK_SIZE, UPLOAD_MAX_RETRIES,
    UPLOAD_RETRY_INTERVAL_SECS,
};

use super::cancellation::CancellationToken;
use super::manager::{ClaimedWorkOrder, WorkOrderOutcome};
use super::progress::TransferSpeed;
use super::queue::TransferQueue;
use super::status::Status;

/// Runs until `cancel` is flipped (queue back-off or process shutdown).
pub async fn run(
    queue: Arc<TransferQueue>,
    worker_id: u64,
    cancel: CancellationToken,
    speed: Arc<std::sync::Mutex<TransferSpeed>>,
) {
    while !cancel.is_cancelled() {
        while queue.is_paused() {
            if cancel.is_cancelled() {
                queue.notify_worker_ended(worker_id);
                return;
            }
            tokio::time::sleep(Duration::from_secs(QUEUE_IDLE_POLL_SECS)).await;
        }

        let claimed = queue.manager().claim_next_work_order(queue.transfer_type()).await;
        let Some(claimed) = claimed else {
            tokio::time::sleep(Duration::from_secs(QUEUE_IDLE_POLL_SECS)).await;
            continue;
        };

        match claimed {
            ClaimedWorkOrder::Upload {
                transfer_id,
                index,
                offset,
                size,
                part_number,
                is_single_upload,
                object_key,
                local_file_path,
                user_data,
            } => {
                log_mdc::insert("transfer_id", transfer_id.to_string());
                log_mdc::insert("work_order", index.to_string());

                run_upload_order(
                    &queue,
                    worker_id,
                    &cancel,
                    &speed,
                    transfer_id,
                    index,
                    offset,
                    size,
                    part_number,
                    is_single_upload,
                    &object_key,
                    &local_file_path,
                    &user_data,
                )
                .await;

                log_mdc::remove("transfer_id");
                log_mdc::remove("work_order");
            }
            ClaimedWorkOrder::Download {
                transfer_id,
                index,
                url,
                local_path,
                user_data,
            } => {
                log_mdc::insert("transfer_id", transfer_id.to_string());
                log_mdc::insert("work_order", index.to_string());

                run_download_order(&queue, &cancel, &speed, transfer_id, index, &url, &local_path, &user_data).await;

                log_mdc::remove("transfer_id");
                log_mdc::remove("work_order");
            }
        }
    }
    queue.notify_worker_ended(worker_id);
}

/// Waits while the owning transfer is paused, returns `false` if it has
/// moved to a terminal state (cancellation) while waiting.
async fn wait_while_paused(queue: &TransferQueue, transfer_id: uuid::Uuid) -> bool {
    loop {
        match queue.manager().transfer_status(transfer_id).await {
            Some(Status::Paused) => tokio::time::sleep(Duration::from_secs(QUEUE_IDLE_POLL_SECS)).await,
            Some(Status::Failure) => return false,
            Some(_) => return true,
            None => return false,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_upload_order(
    queue: &Arc<TransferQueue>,
    worker_id: u64,
    cancel: &CancellationToken,
    speed: &Arc<std::sync::Mutex<TransferSpeed>>,
    transfer_id: uuid::Uuid,
    index: usize,
    offset: u64,
    size: u64,
    part_number: u32,
    is_single_upload: bool,
    object_key: &str,
    local_file_path: &std::path::Path,
    user_data: &super::UserData,
) {
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            queue.manager().reclaim_work_order(transfer_id, index).await;
            return;
        }
        if !wait_while_paused(queue, transfer_id).await {
            return;
        }

        let outcome = upload_once(
            queue,
            transfer_id,
            index,
            offset,
            size,
            part_number,
            is_single_upload,
            object_key,
            local_file_path,
            user_data,
            speed,
        )
        .await;

        match outcome {
            Ok(etag) => {
                let _ = queue
                    .manager()
                    .complete_work_order(
                        transfer_id,
                        index,
                        WorkOrderOutcome::Success { etag },
                        queue.r2(),
                        queue.queue_manager(),
                    )
                    .await;
                queue.notify_success();
                return;
            }
            Err(reason) => {
                attempt += 1;
                warn!("upload work order {index} of {transfer_id} failed (attempt {attempt}): {reason}");
                queue.manager().rewind_progress(transfer_id, index).await;

                if attempt >= UPLOAD_MAX_RETRIES {
                    let _ = queue
                        .manager()
                        .complete_work_order(
                            transfer_id,
                            index,
                            WorkOrderOutcome::Failure {
                                reason: format!("giving up after {attempt} attempts: {reason}"),
                            },
                            queue.r2(),
                            queue.queue_manager(),
                        )
                        .await;
                    return;
                }

                let _ = queue
                    .manager()
                    .complete_work_order(
                        transfer_id,
                        index,
                        WorkOrderOutcome::Retry { reason },
                        queue.r2(),
                        queue.queue_manager(),
                    )
                    .await;
                queue.notify_retry(worker_id);
                tokio::time::sleep(Duration::from_secs(UPLOAD_RETRY_INTERVAL_SECS)).await;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn upload_once(
    queue: &Arc<TransferQueue>,
    transfer_id: uuid::Uuid,
    index: usize,
    offset: u64,
    size: u64,
    part_number: u32,
    is_single_upload: bool,
    object_key: &str,
    local_file_path: &std::path::Path,
    user_data: &super::UserData,
    speed: &Arc<std::sync::Mutex<TransferSpeed>>,
) -> Result<Option<crate::clients::Etag>, String> {
    let mut file = tokio::fs::File::open(local_file_path)
        .await
        .map_err(|e| e.to_string())?;
    file.seek(SeekFrom::Start(offset)).await.map_err(|e| e.to_string())?;

    let body = chunked_body_stream(
        file,
        size,
        queue.manager().clone(),
        transfer_id,
        index,
        Arc::clone(speed),
    );

    if is_single_upload {
        queue
            .r2()
            .upload_single(user_data, object_key, body)
            .await
            .map_err(|e| e.to_string())?;
        Ok(None)
    } else {
        let upload_id = queue
            .manager()
            .get_or_create_upload_id(transfer_id, queue.r2())
            .await
            .map_err(|e| e.to_string())?;
        let etag = queue
            .r2()
            .upload_part(user_data, object_key, &upload_id, part_number, body)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Some(etag))
    }
}

/// A pull-based byte-chunk stream the HTTP client drains one `UPLOAD_CHUNK_SIZE`
/// piece at a time. Each pull is a suspension point: it checks the owning
/// transfer's status (pausing in place, ending the stream on cancellation)
/// before reading and reporting the next chunk's bytes to progress.
fn chunked_body_stream(
    file: tokio::fs::File,
    total: u64,
    manager: Arc<super::manager::TransferManager>,
    transfer_id: uuid::Uuid,
    index: usize,
    speed: Arc<std::sync::Mutex<TransferSpeed>>,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    struct State {
        file: tokio::fs::File,
        remaining: u64,
    }

    futures_util::stream::unfold(
        State { file, remaining: total },
        move |mut state| {
            let manager = manager.clone();
            let speed = Arc::clone(&speed);
            async move {
                if state.remaining == 0 {
                    return None;
                }

                loop {
                    match manager.transfer_status(transfer_id).await {
                        Some(Status::Paused) => {
                            tokio::time::sleep(Duration::from_secs(QUEUE_IDLE_POLL_SECS)).await;
                        }
                        Some(Status::Failure) | None => return None,
                        Some(_) => break,
                    }
                }

                let to_read = (UPLOAD_CHUNK_SIZE as u64).min(state.remaining) as usize;
                let mut buf = vec![0u8; to_read];
                match state.file.read_exact(&mut buf).await {
                    Ok(()) => {
                        state.remaining -= to_read as u64;
                        manager.advance_progress(transfer_id, index, to_read as u64).await;
                        speed.lock().expect("speed lock poisoned").update(to_read as u64);
                        Some((Ok(Bytes::from(buf)), state))
                    }
                    Err(e) => Some((Err(e), state)),
                }
            }
        },
    )
}

async fn run_download_order(
    queue: &Arc<TransferQueue>,
    cancel: &CancellationToken,
    speed: &Arc<std::sync::Mutex<TransferSpeed>>,
    transfer_id: uuid::Uuid,
    index: usize,
    url: &str,
    local_path: &std::path::Path,
    user_data: &super::UserData,
) {
    loop {
        if cancel.is_cancelled() {
            queue.manager().reclaim_work_order(transfer_id, index).await;
            return;
        }
        if !wait_while_paused(queue, transfer_id).await {
            let _ = queue
                .manager()
                .complete_work_order(
                    transfer_id,
                    index,
                    WorkOrderOutcome::Failure {
                        reason: "cancelled".to_owned(),
                    },
                    queue.r2(),
                    queue.queue_manager(),
                )
                .await;
            return;
        }

        match download_once(queue, transfer_id, index, url, local_path, user_data, speed).await {
            Ok(()) => {
                info!("work order {index} of {transfer_id} downloaded");
                let _ = queue
                    .manager()
                    .complete_work_order(
                        transfer_id,
                        index,
                        WorkOrderOutcome::Success { etag: None },
                        queue.r2(),
                        queue.queue_manager(),
                    )
                    .await;
                return;
            }
            Err(reason) => {
                warn!("download work order {index} of {transfer_id} failed: {reason}");
                queue.manager().rewind_progress(transfer_id, index).await;
                let _ = queue
                    .manager()
                    .complete_work_order(transfer_id, index, WorkOrderOutcome::Retry { reason }, queue.r2(), queue.queue_manager())
                    .await;
                tokio::time::sleep(Duration::from_secs(DOWNLOAD_RETRY_INTERVAL_SECS)).await;
            }
        }
    }
}

async fn download_once(
    queue: &Arc<TransferQueue>,
    transfer_id: uuid::Uuid,
    index: usize,
    url: &str,
    local_path: &std::path::Path,
    user_data: &super::UserData,
    speed: &Arc<std::sync::Mutex<TransferSpeed>>,
) -> Result<(), String> {
    if let Some(parent) = local_path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| e.to_string())?;
    }

    let response = queue
        .r2()
        .get_url(user_data, url)
        .await
        .map_err(|e| e.to_string())?;

    if let Some(total) = response.content_length() {
        queue.manager().set_work_order_total(transfer_id, index, total).await;
    }

    let mut file = tokio::fs::File::create(local_path).await.map_err(|e| e.to_string())?;
    let mut stream = response.bytes_stream();

    use tokio::io::AsyncWriteExt;
    while let Some(chunk) = stream.next().await {
        if !wait_while_paused(queue, transfer_id).await {
            return Err("cancelled mid-download".to_owned());
        }
        let chunk = chunk.map_err(|e| e.to_string())?;
        file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        queue.manager().advance_progress(transfer_id, index, chunk.len() as u64).await;
        speed.lock().expect("speed lock poisoned").update(chunk.len() as u64);
    }

    Ok(())
}
