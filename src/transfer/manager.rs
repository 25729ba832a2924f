//! Process-wide registry of every known transfer.
//!
//! An owned value constructed once at server startup and threaded through
//! `actix_web::web::Data`, not a global or lazy-initialized singleton - the
//! HTTP handlers and the queue scanners all reach it through the same
//! `Arc`. Reads (queue scans) and writes (handler-driven add/remove) are
//! reconciled with a `tokio::sync::RwLock`: the scanner takes a read guard
//! for the duration of one scan, which is enough to tolerate concurrent
//! appends without the scan itself needing a snapshot copy.
//!
//! Insertion order matters: the queue scan's FIFO fairness depends on it, so
//! a plain `HashMap` (unordered) or `BTreeMap` (ordered by the random UUID
//! key, not by arrival) won't do. `order` tracks arrival order directly
//! alongside the lookup map.

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::clients::{QueueManager, R2Worker};

use super::status::Status;
use super::transfer::{Transfer, TransferKind};
use super::user_data::UserData;
use super::work_order::Payload;

#[derive(Default)]
struct Registry {
    by_id: HashMap<Uuid, Transfer>,
    order: Vec<Uuid>,
}

pub struct TransferManager {
    registry: RwLock<Registry>,
}

impl TransferManager {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
        }
    }

    pub async fn add(&self, transfer: Transfer) -> Uuid {
        let id = transfer.id;
        let mut registry = self.registry.write().await;
        registry.order.push(id);
        registry.by_id.insert(id, transfer);
        id
    }

    /// Stops a live transfer before removing it, per the source's
    /// delete-transitions-to-failure-first behavior.
    pub async fn remove(&self, id: Uuid) -> bool {
        let mut registry = self.registry.write().await;
        match registry.by_id.get_mut(&id) {
            Some(transfer) => {
                transfer.stop();
                registry.by_id.remove(&id);
                registry.order.retain(|existing| *existing != id);
                true
            }
            None => false,
        }
    }

    pub async fn with_transfer<R>(&self, id: Uuid, f: impl FnOnce(&Transfer) -> R) -> Option<R> {
        self.registry.read().await.by_id.get(&id).map(f)
    }

    pub async fn with_transfer_mut<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Transfer) -> R,
    ) -> Option<R> {
        self.registry.write().await.by_id.get_mut(&id).map(f)
    }

    /// Runs `f` over every transfer in arrival order, e.g. to render the
    /// `/transfers` summary list.
    pub async fn with_all_in_order<R>(&self, f: impl FnOnce(Vec<&Transfer>) -> R) -> R {
        let registry = self.registry.read().await;
        let ordered: Vec<&Transfer> = registry
            .order
            .iter()
            .filter_map(|id| registry.by_id.get(id))
            .collect();
        f(ordered)
    }

    /// Returns the ids, in registry (arrival) order, of transfers whose type
    /// matches `type_name` and whose status is `running` - the set a queue
    /// scan is allowed to pull work orders from.
    pub async fn running_ids_of_type(&self, type_name: &'static str) -> Vec<Uuid> {
        let registry = self.registry.read().await;
        registry
            .order
            .iter()
            .filter(|id| {
                registry
                    .by_id
                    .get(id)
                    .is_some_and(|t| t.type_name() == type_name && t.status == Status::Running)
            })
            .copied()
            .collect()
    }

    /// Scans transfers of `type_name` in arrival order and atomically claims
    /// (`created` -> `running`) the first ready work order found, mirroring
    /// the source's linear registry scan. Returns everything the worker
    /// needs to execute the claim without holding the registry lock for the
    /// duration of the network call.
    pub async fn claim_next_work_order(&self, type_name: &'static str) -> Option<ClaimedWorkOrder> {
        let mut registry = self.registry.write().await;
        for id in registry.order.clone() {
            let Some(transfer) = registry.by_id.get_mut(&id) else {
                continue;
            };
            if transfer.type_name() != type_name || transfer.status != Status::Running {
                continue;
            }
            let Some(index) = transfer.work_orders.iter().position(|wo| wo.status == Status::Created) else {
                continue;
            };
            transfer.work_orders[index].status = Status::Running;

            return Some(match &transfer.kind {
                TransferKind::Upload(upload) => {
                    let Payload::Upload {
                        offset,
                        size,
                        part_number,
                        is_single_upload,
                    } = &transfer.work_orders[index].payload
                    else {
                        unreachable!("upload transfer holds a download work order")
                    };
                    ClaimedWorkOrder::Upload {
                        transfer_id: id,
                        index,
                        offset: *offset,
                        size: *size,
                        part_number: *part_number,
                        is_single_upload: *is_single_upload,
                        object_key: upload.object_key.clone(),
                        local_file_path: upload.local_file_path.clone(),
                        user_data: transfer.user_data.clone(),
                    }
                }
                TransferKind::Download(_) => {
                    let Payload::Download {
                        url,
                        local_path,
                        ..
                    } = &transfer.work_orders[index].payload
                    else {
                        unreachable!("download transfer holds an upload work order")
                    };
                    ClaimedWorkOrder::Download {
                        transfer_id: id,
                        index,
                        url: url.clone(),
                        local_path: local_path.clone(),
                        user_data: transfer.user_data.clone(),
                    }
                }
            });
        }
        None
    }

    /// Returns this upload's multipart `upload_id`, creating it under the
    /// registry's read lock the first time any worker asks (subsequent
    /// callers get the same id back via `UploadState`'s internal
    /// single-assignment cell). A read lock suffices because every mutation
    /// `UploadState` performs here is through interior mutability.
    pub async fn get_or_create_upload_id(&self, transfer_id: Uuid, r2: &R2Worker) -> super::Result<String> {
        let registry = self.registry.read().await;
        let transfer = registry
            .by_id
            .get(&transfer_id)
            .ok_or(super::Error::NotFound(transfer_id))?;
        let TransferKind::Upload(ref upload) = transfer.kind else {
            return Err(super::Error::NotFound(transfer_id));
        };
        let user_data = transfer.user_data.clone();
        upload.upload_id(r2, &user_data).await
    }

    /// Applies a byte-level progress delta to one work order. The owning
    /// transfer's own `progress` only moves in whole work-order increments,
    /// via `recompute()` on completion - see its doc comment.
    pub async fn advance_progress(&self, transfer_id: Uuid, index: usize, by: u64) {
        let mut registry = self.registry.write().await;
        if let Some(transfer) = registry.by_id.get_mut(&transfer_id) {
            transfer.work_orders[index].progress.increase_done(by);
        }
    }

    /// Resets a work order's byte-level progress to zero - used when a
    /// chunked upload attempt fails partway and must restart the part from
    /// offset 0.
    pub async fn rewind_progress(&self, transfer_id: Uuid, index: usize) {
        let mut registry = self.registry.write().await;
        if let Some(transfer) = registry.by_id.get_mut(&transfer_id) {
            transfer.work_orders[index].progress.set_done(0);
        }
    }

    /// Returns a work order its worker was killed mid-retry (queue back-off)
    /// to `created` so another worker can claim it. Distinct from an
    /// in-place retry, which keeps the order `running` with its current
    /// worker - see `WorkOrder::reclaim`.
    pub async fn reclaim_work_order(&self, transfer_id: Uuid, index: usize) {
        let mut registry = self.registry.write().await;
        if let Some(transfer) = registry.by_id.get_mut(&transfer_id) {
            transfer.work_orders[index].reclaim();
        }
    }

    /// Records a download work order's total size once its response carries
    /// a `Content-Length`; uploads already know their size at creation time.
    pub async fn set_work_order_total(&self, transfer_id: Uuid, index: usize, total: u64) {
        let mut registry = self.registry.write().await;
        if let Some(transfer) = registry.by_id.get_mut(&transfer_id) {
            transfer.work_orders[index].progress.set_total(total);
        }
    }

    /// Current status of a transfer, used by the in-flight chunk stream to
    /// decide whether to pause or abort mid-stream.
    pub async fn transfer_status(&self, transfer_id: Uuid) -> Option<Status> {
        self.registry.read().await.by_id.get(&transfer_id).map(|t| t.status)
    }

    /// Records the outcome of a work order, recomputes the owning
    /// transfer's aggregate progress/status, and - if the transfer just
    /// reached a terminal state and is an upload - runs the once-only
    /// finalizer (complete/abort-multipart, job-create, cleanup) before
    /// releasing the registry lock.
    ///
    /// Held across the finalize network calls, the registry write lock
    /// blocks every other transfer's API/queue access for that span. That's
    /// a deliberate simplicity trade-off for this rewrite (see design notes)
    /// over threading finalize state out of the lock.
    pub async fn complete_work_order(
        &self,
        transfer_id: Uuid,
        index: usize,
        outcome: WorkOrderOutcome,
        r2: &R2Worker,
        queue_manager: &QueueManager,
    ) -> super::Result<()> {
        let mut registry = self.registry.write().await;
        let Some(transfer) = registry.by_id.get_mut(&transfer_id) else {
            return Ok(());
        };

        match outcome {
            WorkOrderOutcome::Success { etag } => {
                transfer.work_orders[index].mark_success();
                if let (TransferKind::Upload(upload), Some(etag)) = (&transfer.kind, etag) {
                    upload.push_etag(etag);
                }
            }
            WorkOrderOutcome::Retry { reason } => {
                transfer.work_orders[index].record_retry(reason);
                return Ok(());
            }
            WorkOrderOutcome::Failure { reason } => {
                transfer.work_orders[index].mark_failure(reason);
            }
        }

        if !transfer.recompute() {
            return Ok(());
        }

        let TransferKind::Upload(ref upload) = transfer.kind else {
            return Ok(());
        };
        if !upload.mark_ended() {
            return Ok(());
        }

        let all_succeeded = transfer
            .work_orders
            .iter()
            .all(|wo| wo.status == Status::Success);
        let is_multipart = !matches!(
            transfer.work_orders[0].payload,
            Payload::Upload {
                is_single_upload: true,
                ..
            }
        );
        let user_data = transfer.user_data.clone();
        upload
            .finalize(r2, queue_manager, &user_data, all_succeeded, is_multipart)
            .await
    }
}

/// Everything a worker needs to execute a claimed work order without
/// touching the registry again until it reports back.
pub enum ClaimedWorkOrder {
    Upload {
        transfer_id: Uuid,
        index: usize,
        offset: u64,
        size: u64,
        part_number: u32,
        is_single_upload: bool,
        object_key: String,
        local_file_path: PathBuf,
        user_data: UserData,
    },
    Download {
        transfer_id: Uuid,
        index: usize,
        url: String,
        local_path: PathBuf,
        user_data: UserData,
    },
}

/// What a worker reports back after executing (or retrying) one work order.
pub enum WorkOrderOutcome {
    Success { etag: Option<crate::clients::Etag> },
    Retry { reason: String },
    Failure { reason: String },
}

impl Default for TransferManager {
    fn default() -> Self {
        Self::new()
    }
}
