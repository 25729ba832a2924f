//! Upload-specific transfer state: a local archive pushed to object storage,
//! single-shot or multipart, followed by a job-creation post.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::info;
use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;
use tokio::sync::OnceCell;

use crate::clients::{Etag, QueueManager, R2Worker};
use crate::config::constants::{HASH_READ_CHUNK_SIZE, PROTOCOL_VERSION, UPLOAD_PART_SIZE};

use super::jobspec::{build_operations, derive_frame_end, JobInformation};
use super::user_data::UserData;
use super::work_order::WorkOrder;
use super::Error;

/// Upload-only fields of a `Transfer`. `upload_id` and `etags` are the two
/// pieces of state every worker handling a part of this upload may touch
/// concurrently; `upload_id` is single-assignment (first worker that needs
/// it creates it), `etags` is append-only and sorted at completion time.
pub struct UploadState {
    pub local_file_path: PathBuf,
    pub job_id: String,
    pub job_info: JobInformation,
    pub file_size: u64,
    pub file_hash: String,
    pub object_key: String,

    upload_id: OnceCell<String>,
    etags: Mutex<Vec<Etag>>,

    /// Guards the finalize path (complete/abort-multipart + job-create +
    /// cleanup) so exactly one `update()` call runs it, even if several
    /// workers finish the last few work orders at nearly the same instant.
    transfer_ended_called: AtomicBool,
}

impl UploadState {
    pub fn new(local_file_path: PathBuf, job_id: String, job_info: JobInformation) -> Self {
        let object_key = format!("{job_id}/input/package.zip");
        Self {
            local_file_path,
            job_id,
            job_info,
            file_size: 0,
            file_hash: String::new(),
            object_key,
            upload_id: OnceCell::new(),
            etags: Mutex::new(Vec::new()),
            transfer_ended_called: AtomicBool::new(false),
        }
    }

    /// Streams the file through MD5 (16 MiB reads), stats its size, and
    /// returns the work orders this upload decomposes into: one
    /// single-upload order under the part-size threshold, otherwise
    /// `ceil(size / UPLOAD_PART_SIZE)` multipart orders with the last sized
    /// to the remainder.
    pub async fn initialize(&mut self) -> super::Result<Vec<WorkOrder>> {
        if !self.local_file_path.is_file() {
            return Err(Error::LocalPathMissing(self.local_file_path.clone()));
        }

        self.file_hash = hash_file(&self.local_file_path).await?;
        self.file_size = tokio::fs::metadata(&self.local_file_path).await?.len();

        info!(
            "upload {} hashed to {}, size {} bytes",
            self.job_id, self.file_hash, self.file_size
        );

        if self.file_size < UPLOAD_PART_SIZE {
            Ok(vec![WorkOrder::new_upload(0, 0, self.file_size, 1, true)])
        } else {
            let part_count = self.file_size.div_ceil(UPLOAD_PART_SIZE);
            let mut orders = Vec::with_capacity(part_count as usize);
            for i in 0..part_count - 1 {
                let offset = i * UPLOAD_PART_SIZE;
                orders.push(WorkOrder::new_upload(
                    i as u32,
                    offset,
                    UPLOAD_PART_SIZE,
                    (i + 1) as u32,
                    false,
                ));
            }
            let last_offset = (part_count - 1) * UPLOAD_PART_SIZE;
            orders.push(WorkOrder::new_upload(
                (part_count - 1) as u32,
                last_offset,
                self.file_size - last_offset,
                part_count as u32,
                false,
            ));
            Ok(orders)
        }
    }

    /// Lazily creates the multipart upload the first time any worker needs
    /// an `upload_id`, then hands the same id to every subsequent caller.
    pub async fn upload_id(&self, r2: &R2Worker, user_data: &UserData) -> super::Result<String> {
        self.upload_id
            .get_or_try_init(|| async { Ok(r2.create_multipart_upload(user_data, &self.object_key).await?) })
            .await
            .cloned()
    }

    pub fn push_etag(&self, etag: Etag) {
        self.etags
            .lock()
            .expect("upload etag lock poisoned")
            .push(etag);
    }

    fn take_etags(&self) -> Vec<Etag> {
        std::mem::take(&mut *self.etags.lock().expect("upload etag lock poisoned"))
    }

    pub fn mark_ended(&self) -> bool {
        self.transfer_ended_called
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Runs exactly once per upload, guarded by the caller checking
    /// `mark_ended()` first. `all_succeeded` decides whether to complete or
    /// abort the multipart upload (single-upload orders skip both - there's
    /// no multipart session to close).
    pub async fn finalize(
        &self,
        r2: &R2Worker,
        queue_manager: &QueueManager,
        user_data: &UserData,
        all_succeeded: bool,
        is_multipart: bool,
    ) -> super::Result<()> {
        if is_multipart {
            let upload_id = self.upload_id(r2, user_data).await?;
            if all_succeeded {
                let mut etags = self.take_etags();
                r2.complete_multipart_upload(user_data, &self.object_key, &upload_id, &mut etags)
                    .await?;
            } else {
                r2.abort_multipart_upload(user_data, &self.object_key, &upload_id)
                    .await?;
            }
        }

        if all_succeeded {
            self.run_job_create(queue_manager, user_data).await?;
        }

        self.cleanup().await;
        Ok(())
    }

    async fn run_job_create(
        &self,
        queue_manager: &QueueManager,
        user_data: &UserData,
    ) -> super::Result<()> {
        let info = &self.job_info;
        let end = derive_frame_end(
            info.frame_start,
            info.frame_end,
            info.frame_step,
            info.batch_size,
        );

        let operations = build_operations(
            std::path::Path::new(&info.blend_name)
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or(&info.blend_name),
            &info.render_format,
            info.max_thumbnail_size,
            &self.file_hash,
            info.frame_step,
            &user_data.api_token,
        );

        let job = serde_json::json!({
            "job_data": {
                "id": self.job_id,
                "name": info.name,
                "status": "queued",
                "start": info.frame_start,
                "batch_size": info.batch_size,
                "end": end,
                "frame_step": info.frame_step,
                "render_passes": info.render_passes,
                "render_format": info.render_format,
                "version": PROTOCOL_VERSION,
                "render_engine": info.render_engine,
                "blender_version": info.blender_version,
                "archive_size": self.file_size,
            },
            "operations": operations,
        });

        queue_manager.node_job(user_data, &job).await?;
        Ok(())
    }

    /// Removes the temp working directory the archive was staged in. Best
    /// effort: a leftover directory from a cleanup failure is a disk-hygiene
    /// nuisance, not a transfer-correctness problem.
    async fn cleanup(&self) {
        if let Some(parent) = self.local_file_path.parent() {
            if let Err(err) = tokio::fs::remove_dir_all(parent).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("failed to clean up {}: {err}", parent.display());
                }
            }
        }
    }
}

async fn hash_file(path: &std::path::Path) -> super::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; HASH_READ_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
