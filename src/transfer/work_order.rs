//! The unit of work pulled by a `QueueWorker`: a byte range of an upload, or
//! one file of a download.

use serde::Serialize;

use super::progress::Progress;
use super::status::Status;

/// Payload distinguishing an upload work order from a download one. Kept as
/// an enum rather than two standalone types so `Transfer::work_orders` can
/// hold a single homogeneous `Vec` regardless of transfer kind.
#[derive(Debug, Clone)]
pub enum Payload {
    Upload {
        offset: u64,
        size: u64,
        part_number: u32,
        is_single_upload: bool,
    },
    Download {
        url: String,
        local_path: std::path::PathBuf,
        rel_path: String,
    },
}

#[derive(Debug)]
pub struct WorkOrder {
    /// Stable ordinal within the owning transfer; multipart part numbers and
    /// download frame ordinals both flow from this.
    pub number: u32,
    pub payload: Payload,
    pub progress: Progress,
    pub status: Status,
    pub status_text: String,
    /// Retry narrative: one entry appended per failed attempt.
    pub history: Vec<String>,
}

impl WorkOrder {
    pub fn new_upload(
        number: u32,
        offset: u64,
        size: u64,
        part_number: u32,
        is_single_upload: bool,
    ) -> Self {
        let mut progress = Progress::new();
        progress.set_total(size);
        Self {
            number,
            payload: Payload::Upload {
                offset,
                size,
                part_number,
                is_single_upload,
            },
            progress,
            status: Status::Created,
            status_text: String::new(),
            history: Vec::new(),
        }
    }

    pub fn new_download(
        number: u32,
        url: String,
        local_path: std::path::PathBuf,
        rel_path: String,
    ) -> Self {
        Self {
            number,
            payload: Payload::Download {
                url,
                local_path,
                rel_path,
            },
            progress: Progress::new(),
            status: Status::Created,
            status_text: String::new(),
            history: Vec::new(),
        }
    }

    /// Record a failed attempt: reset progress and note the failure. Status
    /// is left untouched (`running`) - the same worker retries this order in
    /// place, and it must not become reclaimable by `claim_next_work_order`
    /// while that's happening or two workers could stream the same part.
    pub fn record_retry(&mut self, reason: impl Into<String>) {
        self.progress.set_done(0);
        self.history.push(reason.into());
    }

    /// Returns a claimed order to the `created` pool so another worker can
    /// pick it up. Used only when the worker holding it is killed outright
    /// (queue back-off) - not on an ordinary retry, which keeps the order
    /// with its current worker.
    pub fn reclaim(&mut self) {
        self.progress.set_done(0);
        self.status = Status::Created;
    }

    pub fn mark_success(&mut self) {
        self.status = Status::Success;
    }

    pub fn mark_failure(&mut self, reason: impl Into<String>) {
        self.status_text = reason.into();
        self.status = Status::Failure;
    }

    pub fn small_dict(&self) -> WorkOrderSummary<'_> {
        WorkOrderSummary {
            number: self.number,
            payload: &self.payload,
            done: self.progress.done,
            total: self.progress.total,
            status: self.status,
            status_history: &self.history,
        }
    }
}

/// The JSON-facing view of a work order returned from `/transfers/{id}`.
#[derive(Debug, Serialize)]
pub struct WorkOrderSummary<'a> {
    pub number: u32,
    #[serde(flatten)]
    pub payload: &'a Payload,
    pub done: u64,
    pub total: u64,
    pub status: Status,
    pub status_history: &'a [String],
}

impl Serialize for Payload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        match self {
            Payload::Upload {
                offset,
                size,
                part_number,
                is_single_upload,
            } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("offset", offset)?;
                map.serialize_entry("size", size)?;
                map.serialize_entry("part_number", part_number)?;
                map.serialize_entry("is_single_upload", is_single_upload)?;
                map.end()
            }
            Payload::Download {
                url,
                local_path,
                rel_path,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("url", url)?;
                map.serialize_entry("local_path", local_path)?;
                map.serialize_entry("rel_path", rel_path)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_resets_progress_and_appends_history_but_keeps_the_order_running() {
        let mut wo = WorkOrder::new_download(
            0,
            "https://example/0001.png".into(),
            "/tmp/0001.png".into(),
            "beauty/0001.png".into(),
        );
        wo.progress.set_done_total(512, 1024);
        wo.status = Status::Running;

        wo.record_retry("connection reset");

        assert_eq!(wo.progress.done, 0);
        assert_eq!(wo.history, vec!["connection reset".to_string()]);
        assert_eq!(wo.status, Status::Running, "a retrying order must stay unclaimable");
    }

    #[test]
    fn reclaim_resets_progress_and_returns_to_created() {
        let mut wo = WorkOrder::new_download(
            0,
            "https://example/0001.png".into(),
            "/tmp/0001.png".into(),
            "beauty/0001.png".into(),
        );
        wo.progress.set_done_total(512, 1024);
        wo.status = Status::Running;

        wo.reclaim();

        assert_eq!(wo.progress.done, 0);
        assert_eq!(wo.status, Status::Created);
    }
}
