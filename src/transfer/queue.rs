//! A shared worker pool draining ready work orders across every transfer of
//! one type (upload or download).
//!
//! The queue holds no work orders itself; `TransferManager::claim_next_work_order`
//! does the actual scan. What the queue owns is the pool of running worker
//! tasks and the ramp-up/back-off bookkeeping for the upload side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use tokio::task::JoinHandle;

use crate::clients::{QueueManager, R2Worker};
use crate::config::constants::{DOWNLOAD_WORKER_COUNT, UPLOAD_MAX_WORKERS, UPLOAD_START_WORKERS};

use super::cancellation::CancellationToken;
use super::manager::TransferManager;
use super::progress::TransferSpeed;
use super::worker;

pub struct WorkerHandle {
    id: u64,
    cancel: CancellationToken,
    join: JoinHandle<()>,
    pub speed: Arc<std::sync::Mutex<TransferSpeed>>,
}

/// Fixed (download) or ramping (upload) worker pool for one transfer type.
pub struct TransferQueue {
    transfer_type: &'static str,
    paused: AtomicBool,
    workers: std::sync::Mutex<Vec<WorkerHandle>>,
    next_worker_id: std::sync::atomic::AtomicU64,
    max_workers: usize,
    ramps: bool,
    manager: Arc<TransferManager>,
    r2: Arc<R2Worker>,
    queue_manager: Arc<QueueManager>,
    r2_base_url: String,
}

impl TransferQueue {
    pub fn new_upload(
        manager: Arc<TransferManager>,
        r2: Arc<R2Worker>,
        queue_manager: Arc<QueueManager>,
        r2_base_url: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            transfer_type: "upload",
            paused: AtomicBool::new(false),
            workers: std::sync::Mutex::new(Vec::new()),
            next_worker_id: std::sync::atomic::AtomicU64::new(0),
            max_workers: UPLOAD_MAX_WORKERS,
            ramps: true,
            manager,
            r2,
            queue_manager,
            r2_base_url,
        })
    }

    pub fn new_download(
        manager: Arc<TransferManager>,
        r2: Arc<R2Worker>,
        queue_manager: Arc<QueueManager>,
        r2_base_url: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            transfer_type: "download",
            paused: AtomicBool::new(false),
            workers: std::sync::Mutex::new(Vec::new()),
            next_worker_id: std::sync::atomic::AtomicU64::new(0),
            max_workers: DOWNLOAD_WORKER_COUNT,
            ramps: false,
            manager,
            r2,
            queue_manager,
            r2_base_url,
        })
    }

    pub fn transfer_type(&self) -> &'static str {
        self.transfer_type
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Starts the pool: one worker for the upload queue (it ramps from
    /// there), the full fixed count for the download queue.
    pub fn start(self: &Arc<Self>) {
        let initial = if self.ramps { UPLOAD_START_WORKERS } else { self.max_workers };
        for _ in 0..initial {
            self.spawn_worker();
        }
    }

    fn spawn_worker(self: &Arc<Self>) {
        let mut workers = self.workers.lock().expect("worker list lock poisoned");
        if workers.len() >= self.max_workers {
            return;
        }
        let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let speed = Arc::new(std::sync::Mutex::new(TransferSpeed::new()));

        let queue = Arc::clone(self);
        let worker_cancel = cancel.clone();
        let worker_speed = Arc::clone(&speed);
        let join = tokio::spawn(async move {
            worker::run(queue, id, worker_cancel, worker_speed).await;
        });

        info!("{} queue: started worker {id} ({}/{})", self.transfer_type, workers.len() + 1, self.max_workers);
        workers.push(WorkerHandle { id, cancel, join, speed });
    }

    /// Ramp-up: on a successful completion, add one more worker (upload
    /// queue only; the download queue stays at its fixed count).
    pub fn notify_success(self: &Arc<Self>) {
        if self.ramps {
            self.spawn_worker();
        }
    }

    /// Back-off: on a retry, stop one *other* worker (never the caller) so
    /// a struggling connection doesn't keep accumulating concurrent
    /// retriers. A no-op with one or zero workers.
    pub fn notify_retry(&self, sender_id: u64) {
        if !self.ramps {
            return;
        }
        let mut workers = self.workers.lock().expect("worker list lock poisoned");
        if workers.len() <= 1 {
            return;
        }
        if let Some(pos) = workers.iter().position(|w| w.id != sender_id) {
            let victim = workers.remove(pos);
            victim.cancel.cancel();
            debug!("{} queue: backed off worker {}", self.transfer_type, victim.id);
        }
    }

    pub fn notify_worker_ended(&self, worker_id: u64) {
        let mut workers = self.workers.lock().expect("worker list lock poisoned");
        workers.retain(|w| w.id != worker_id);
    }

    pub fn manager(&self) -> &Arc<TransferManager> {
        &self.manager
    }

    pub fn r2(&self) -> &Arc<R2Worker> {
        &self.r2
    }

    pub fn queue_manager(&self) -> &Arc<QueueManager> {
        &self.queue_manager
    }

    pub fn r2_base_url(&self) -> &str {
        &self.r2_base_url
    }

    /// Worker speed snapshot for `/api/queues`, in declaration order.
    pub fn worker_speeds(&self) -> Vec<f64> {
        self.workers
            .lock()
            .expect("worker list lock poisoned")
            .iter()
            .map(|w| w.speed.lock().expect("speed lock poisoned").value)
            .collect()
    }

    /// Cancels every worker task. Used only at process shutdown; work
    /// orders left `running` are simply abandoned along with the process -
    /// there is no persistence to reconcile on the next start.
    pub fn shutdown(&self) {
        let mut workers = self.workers.lock().expect("worker list lock poisoned");
        for w in workers.drain(..) {
            w.cancel.cancel();
            w.join.abort();
        }
    }
}
