//! A cancellation flag a worker checks at its suspension points.
//!
//! Deliberately not a channel or an async notifier: the worker loop already
//! polls it at well-defined checkpoints (top of the loop, between streamed
//! chunks), so a plain atomic flag observed cooperatively is enough - and
//! it's cheap to clone and hand to a spawned task alongside its queue
//! reference.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
