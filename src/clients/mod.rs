//! Thin typed wrappers over the two remote HTTP collaborators: the
//! object-storage worker ("R2") and the farm's queue manager.
//!
//! Both sit on top of one shared [`reqwest::Client`] with the connect/read
//! timeouts the control-plane-style calls use. Neither wrapper retries
//! data-plane PUT/GET on its own - that's the worker loop's job, since a
//! retry here would double-count bytes already reported to `Progress`.
//! Short control-plane calls (create/complete/abort/job-detail/node-job) do
//! get bounded, jittered retry via [`request_with_retries`].

mod error;
pub mod queue_manager;
pub mod r2;

pub use error::{Error, Result};
pub use queue_manager::QueueManager;
pub use r2::{Etag, R2Worker};

use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;

use crate::config::constants::{
    RPC_CONNECT_TIMEOUT_SECS, RPC_MAX_RETRIES, RPC_READ_TIMEOUT_SECS, STREAMING_READ_TIMEOUT_SECS,
};

/// Build the shared client used for short, JSON-in/JSON-out control-plane
/// calls: bounded connect/read timeouts, retried by the caller.
pub fn build_rpc_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(RPC_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(RPC_READ_TIMEOUT_SECS))
        .build()
        .expect("static reqwest client configuration is always valid")
}

/// Build the client used for streaming data-plane PUT/GET: a generous read
/// timeout and no per-request retry, since progress is the liveness signal
/// for a stalled transfer (see design notes on timeouts).
pub fn build_streaming_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(RPC_CONNECT_TIMEOUT_SECS))
        .read_timeout(Duration::from_secs(STREAMING_READ_TIMEOUT_SECS))
        .build()
        .expect("static reqwest client configuration is always valid")
}

/// Run `attempt` up to `RPC_MAX_RETRIES` times, sleeping `tries + jitter`
/// seconds between failures, surfacing the last error once exhausted.
pub(crate) async fn request_with_retries<T, F, Fut>(
    method: &str,
    url: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut tries = 0u32;
    loop {
        tries += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if tries >= RPC_MAX_RETRIES {
                    return Err(Error::RetriesExhausted {
                        method: method.to_owned(),
                        url: url.to_owned(),
                        tries,
                        last: err.to_string(),
                    });
                }
                let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
                let wait = Duration::from_secs_f64(tries as f64 + jitter);
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// Parse a JSON body, wrapping serde errors with the URL they came from.
pub(crate) fn parse_json<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::MalformedResponse(url.to_owned(), e))
}
