//! Done/total bookkeeping and a sliding-window throughput estimate.
//!
//! Both types are pure arithmetic with no knowledge of what's being
//! transferred; `Transfer`, `WorkOrder`, and `TransferQueue` each own one or
//! more of these and update them as bytes move.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;

use crate::config::constants::TRANSFER_SPEED_WINDOW;

/// Tracks `done` out of `total` units (bytes, frames, work orders - the
/// caller decides), deriving a `value` in `[0.0, 1.0]` whenever `total` is
/// known. Before `total` is set, `value` stays at zero rather than dividing
/// by zero.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Progress {
    pub done: u64,
    pub total: u64,
    pub value: f64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_done(&mut self, done: u64) {
        self.done = done;
        self.recompute();
    }

    pub fn increase_done(&mut self, by: u64) {
        self.done += by;
        self.recompute();
    }

    pub fn decrease_done(&mut self, by: u64) {
        self.done = self.done.saturating_sub(by);
        self.recompute();
    }

    pub fn set_total(&mut self, total: u64) {
        self.total = total;
        self.recompute();
    }

    pub fn set_done_total(&mut self, done: u64, total: u64) {
        self.done = done;
        self.total = total;
        self.recompute();
    }

    /// Set `value` directly and derive `done` from it. Used when a caller
    /// already knows a fraction (e.g. mirroring a child transfer's progress)
    /// and doesn't want to recompute it from raw counts.
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
        self.done = (value * self.total as f64) as u64;
    }

    fn recompute(&mut self) {
        if self.total > 0 {
            self.value = self.done as f64 / self.total as f64;
        }
    }
}

/// A bounded sliding-window average of recent throughput, in bytes/second.
///
/// Samples older than the window are dropped; the rate is the sum of bytes
/// transferred across the retained samples divided by the wall-clock span
/// between the oldest and newest. A single sample (or none) yields zero
/// rather than a divide-by-zero or an instantaneous, noisy spike.
#[derive(Debug)]
pub struct TransferSpeed {
    keep: usize,
    entries: VecDeque<(Instant, u64)>,
    pub value: f64,
}

impl TransferSpeed {
    pub fn new() -> Self {
        Self::with_window(TRANSFER_SPEED_WINDOW)
    }

    pub fn with_window(keep: usize) -> Self {
        Self {
            keep,
            entries: VecDeque::with_capacity(keep),
            value: 0.0,
        }
    }

    /// Record that `transferred_since_last_update` bytes moved just now and
    /// recompute the windowed rate.
    pub fn update(&mut self, transferred_since_last_update: u64) {
        self.entries.push_back((Instant::now(), transferred_since_last_update));
        while self.entries.len() > self.keep {
            self.entries.pop_front();
        }

        if self.entries.len() > 1 {
            let start = self.entries.front().unwrap().0;
            let end = self.entries.back().unwrap().0;
            let diff = end.duration_since(start).as_secs_f64();

            let bytes_transferred: u64 = self.entries.iter().map(|(_, n)| n).sum();

            self.value = if diff > 0.0 {
                bytes_transferred as f64 / diff
            } else {
                0.0
            };
        } else {
            self.value = 0.0;
        }
    }
}

impl Default for TransferSpeed {
    fn default() -> Self {
        Self::new()
    }
}
