//! The status values shared by transfers and work orders.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a `Transfer` or a `WorkOrder`.
///
/// Transfers and work orders share the same vocabulary, but not every
/// transition is legal for both: a work order never goes through `paused`
/// (pausing is observed by the worker loop between iterations, not modeled
/// as a work order state), and only a transfer has a `created -> running`
/// gate checked at queue-scan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Created,
    Running,
    Paused,
    Success,
    Failure,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Created => "created",
            Status::Running => "running",
            Status::Paused => "paused",
            Status::Success => "success",
            Status::Failure => "failure",
        };
        f.write_str(s)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Created
    }
}
