//! The user-visible transfer: aggregate progress/status over an ordered set
//! of work orders, plus the upload- or download-specific state needed to
//! initialize them and react to their completion.
//!
//! The original models Upload and Download as subclasses of a shared base.
//! Here that's a tagged variant instead (`TransferKind`): workers and the
//! queue scan only ever look at the shared fields and `work_orders`, while
//! `initialize()`/finalize behavior is dispatched on the kind.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::download::DownloadState;
use super::progress::Progress;
use super::status::Status;
use super::upload::UploadState;
use super::user_data::UserData;
use super::work_order::{WorkOrder, WorkOrderSummary};

pub enum TransferKind {
    Upload(UploadState),
    Download(DownloadState),
}

impl TransferKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            TransferKind::Upload(_) => "upload",
            TransferKind::Download(_) => "download",
        }
    }
}

pub struct Transfer {
    pub id: Uuid,
    pub metadata: serde_json::Value,
    pub user_data: UserData,
    pub created: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub progress: Progress,
    pub status: Status,
    pub status_text: String,
    pub work_orders: Vec<WorkOrder>,
    pub kind: TransferKind,
}

impl Transfer {
    pub fn new(metadata: serde_json::Value, user_data: UserData, kind: TransferKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            metadata,
            user_data,
            created: Utc::now(),
            finished_at: None,
            progress: Progress::new(),
            status: Status::Created,
            status_text: String::new(),
            work_orders: Vec::new(),
            kind,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// created|paused -> running. Starting a transfer that never initialized
    /// (still `created` with no work orders) is legal; the queue simply
    /// finds nothing to do until `work_orders` is populated by
    /// `initialize()`.
    pub fn start(&mut self) {
        if matches!(self.status, Status::Created | Status::Paused) {
            self.status = Status::Running;
        }
    }

    /// Any non-created status -> failure. Starting a stop before the
    /// transfer has ever run is a no-op; there's nothing in flight to tear
    /// down and no terminal finalizer to guard.
    pub fn stop(&mut self) {
        if self.status != Status::Created {
            self.status = Status::Failure;
        }
    }

    pub fn pause(&mut self) {
        if self.status == Status::Running {
            self.status = Status::Paused;
        }
    }

    /// Recomputes aggregate progress from work-order statuses and returns
    /// whether the transfer just reached a terminal state this call (the
    /// caller is responsible for running the once-only finalizer when this
    /// is `true` and the kind is `Upload`).
    ///
    /// The transfer-level `progress` counts finished work orders out of the
    /// total order count - coarser than the byte-level `Progress` each
    /// `WorkOrder` tracks for its own part or file, but the only aggregate
    /// that stays meaningful across very different order sizes (a tiny
    /// thumbnail frame and a multi-gigabyte archive part count the same).
    pub fn recompute(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.progress.set_total(self.work_orders.len() as u64);

        let mut finished = 0u64;
        let mut outstanding = 0u64;
        for wo in &self.work_orders {
            match wo.status {
                Status::Success => finished += 1,
                Status::Running | Status::Created => outstanding += 1,
                Status::Failure | Status::Paused => {}
            }
        }
        self.progress.set_done(finished);

        if self.progress.total > 0 && self.progress.done >= self.progress.total {
            self.status = Status::Success;
            self.finished_at = Some(Utc::now());
            true
        } else if outstanding == 0 && !self.work_orders.is_empty() {
            self.status = Status::Failure;
            self.status_text = match self.kind {
                TransferKind::Upload(_) => "Some parts could not be uploaded".to_owned(),
                TransferKind::Download(_) => "Some files could not be downloaded".to_owned(),
            };
            self.finished_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    pub fn to_summary(&self) -> TransferSummary<'_> {
        TransferSummary {
            id: self.id,
            r#type: self.type_name(),
            progress: self.progress,
            status: self.status,
            status_text: &self.status_text,
            created: self.created,
            age_seconds: (Utc::now() - self.created).num_milliseconds() as f64 / 1000.0,
            finished_at: self.finished_at,
            metadata: &self.metadata,
        }
    }

    pub fn to_detail(&self) -> TransferDetail<'_> {
        TransferDetail {
            summary: self.to_summary(),
            work_orders: self.work_orders.iter().map(WorkOrder::small_dict).collect(),
            local_file_path: match &self.kind {
                TransferKind::Upload(u) => Some(u.local_file_path.to_string_lossy().into_owned()),
                TransferKind::Download(_) => None,
            },
            local_dir_path: match &self.kind {
                TransferKind::Download(d) => Some(d.local_dir_path.to_string_lossy().into_owned()),
                TransferKind::Upload(_) => None,
            },
            job_id: match &self.kind {
                TransferKind::Upload(u) => u.job_id.clone(),
                TransferKind::Download(d) => d.job_id.clone(),
            },
        }
    }
}

#[derive(Serialize)]
pub struct TransferSummary<'a> {
    pub id: Uuid,
    pub r#type: &'static str,
    pub progress: Progress,
    pub status: Status,
    pub status_text: &'a str,
    pub created: DateTime<Utc>,
    pub age_seconds: f64,
    pub finished_at: Option<DateTime<Utc>>,
    pub metadata: &'a serde_json::Value,
}

#[derive(Serialize)]
pub struct TransferDetail<'a> {
    #[serde(flatten)]
    pub summary: TransferSummary<'a>,
    pub work_orders: Vec<WorkOrderSummary<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_dir_path: Option<String>,
    pub job_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn user_data() -> UserData {
        let config = Config::default();
        UserData::from_headers(&config, None, Some("tok"), Some("qm"))
    }

    #[test]
    fn recompute_reaches_success_when_all_orders_done() {
        let mut t = Transfer::new(
            serde_json::json!({}),
            user_data(),
            TransferKind::Download(DownloadState::new("/tmp".into(), "job-1".into())),
        );
        t.status = Status::Running;
        t.work_orders.push(WorkOrder::new_download(0, "u".into(), "p".into(), "r".into()));
        t.work_orders[0].mark_success();
        t.progress.set_total(1);

        assert!(t.recompute());
        assert_eq!(t.status, Status::Success);
        assert_eq!(t.progress.done, t.progress.total);
    }

    #[test]
    fn recompute_fails_when_no_orders_remain_outstanding_but_not_all_succeeded() {
        let mut t = Transfer::new(
            serde_json::json!({}),
            user_data(),
            TransferKind::Download(DownloadState::new("/tmp".into(), "job-1".into())),
        );
        t.status = Status::Running;
        t.work_orders.push(WorkOrder::new_download(0, "u".into(), "p".into(), "r".into()));
        t.work_orders[0].mark_failure("gave up");
        t.progress.set_total(1);

        assert!(t.recompute());
        assert_eq!(t.status, Status::Failure);
        assert_eq!(t.status_text, "Some files could not be downloaded");
    }

    #[test]
    fn stop_before_start_is_rejected() {
        let mut t = Transfer::new(
            serde_json::json!({}),
            user_data(),
            TransferKind::Download(DownloadState::new("/tmp".into(), "job-1".into())),
        );
        t.stop();
        assert_eq!(t.status, Status::Created);
    }
}
