//! Errors from the two remote HTTP collaborators.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request to {0} failed: {1}")]
    Transport(String, #[source] reqwest::Error),

    #[error("{method} {url} returned status {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("{method} {url}: exhausted {tries} attempts, last error: {last}")]
    RetriesExhausted {
        method: String,
        url: String,
        tries: u32,
        last: String,
    },

    #[error("malformed response from {0}: {1}")]
    MalformedResponse(String, #[source] serde_json::Error),

    #[error("queue manager call to endpoint {0} did not return that endpoint's result")]
    MissingEnvelopeResult(&'static str),
}
