//! Everything to do with a single transfer: its in-memory model, the work
//! orders it decomposes into, the shared worker pools that drain them, and
//! the clients those workers call out to.

mod cancellation;
mod download;
mod error;
mod jobspec;
mod manager;
mod progress;
mod queue;
mod status;
mod transfer;
mod upload;
mod user_data;
mod work_order;
mod worker;

pub use cancellation::CancellationToken;
pub use download::DownloadState;
pub use error::{Error, Result};
pub use jobspec::JobInformation;
pub use manager::{ClaimedWorkOrder, TransferManager, WorkOrderOutcome};
pub use progress::{Progress, TransferSpeed};
pub use queue::TransferQueue;
pub use status::Status;
pub use transfer::{Transfer, TransferDetail, TransferKind, TransferSummary};
pub use upload::UploadState;
pub use user_data::UserData;
pub use work_order::{Payload, WorkOrder, WorkOrderSummary};
