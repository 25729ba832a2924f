//! Client for the object-storage worker ("R2") that backs every upload and
//! download's bytes.
//!
//! Every call carries the per-transfer `authentication` header straight from
//! `UserData::api_token`; the worker has no notion of sessions or cookies.

use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::transfer::UserData;

use super::{build_rpc_client, build_streaming_client, request_with_retries, Error, Result};

/// One completed part of a multipart upload, as returned by
/// `action=mpu-uploadpart` and as sent back (sorted) at `action=mpu-complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Etag {
    #[serde(rename = "partNumber")]
    pub part_number: u32,
    pub etag: String,
}

#[derive(Debug, Deserialize)]
struct CreateMultipartResponse {
    #[serde(rename = "uploadId")]
    upload_id: String,
}

pub struct R2Worker {
    rpc: reqwest::Client,
    streaming: reqwest::Client,
    base_url: String,
}

impl R2Worker {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            rpc: build_rpc_client(),
            streaming: build_streaming_client(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, key: &str) -> String {
        if key.starts_with('/') {
            format!("{}{}", self.base_url, key)
        } else {
            format!("{}/{}", self.base_url, key)
        }
    }

    pub async fn create_multipart_upload(&self, user_data: &UserData, key: &str) -> Result<String> {
        let url = self.url(key);
        request_with_retries("POST", &url, || async {
            let response = self
                .rpc
                .post(&url)
                .header("authentication", &user_data.api_token)
                .query(&[("action", "mpu-create")])
                .send()
                .await
                .map_err(|e| Error::Transport(url.clone(), e))?;
            let response = ensure_ok("POST", &url, response).await?;
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::Transport(url.clone(), e))?;
            let parsed: CreateMultipartResponse = super::parse_json(&url, &body)?;
            Ok(parsed.upload_id)
        })
        .await
    }

    /// Sorts `parts` by part number before submitting, per the completion
    /// endpoint's requirement that etags arrive in ascending order.
    pub async fn complete_multipart_upload(
        &self,
        user_data: &UserData,
        key: &str,
        upload_id: &str,
        parts: &mut Vec<Etag>,
    ) -> Result<()> {
        parts.sort_by_key(|p| p.part_number);
        let url = self.url(key);
        let body = json!({ "parts": parts });
        request_with_retries("POST", &url, || async {
            let response = self
                .rpc
                .post(&url)
                .header("authentication", &user_data.api_token)
                .query(&[("action", "mpu-complete"), ("uploadId", upload_id)])
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::Transport(url.clone(), e))?;
            ensure_ok("POST", &url, response).await?;
            Ok(())
        })
        .await
    }

    pub async fn abort_multipart_upload(
        &self,
        user_data: &UserData,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        let url = self.url(key);
        request_with_retries("DELETE", &url, || async {
            let response = self
                .rpc
                .delete(&url)
                .header("authentication", &user_data.api_token)
                .query(&[("action", "mpu-abort"), ("uploadId", upload_id)])
                .send()
                .await
                .map_err(|e| Error::Transport(url.clone(), e))?;
            ensure_ok("DELETE", &url, response).await?;
            Ok(())
        })
        .await
    }

    /// Stream `body` as one multipart part. Single attempt - retry on
    /// failure is the worker loop's responsibility since bytes already
    /// reported to progress must be unwound first.
    pub async fn upload_part<S>(
        &self,
        user_data: &UserData,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: S,
    ) -> Result<Etag>
    where
        S: Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + Sync + 'static,
    {
        let url = self.url(key);
        let response = self
            .streaming
            .put(&url)
            .header("authentication", &user_data.api_token)
            .query(&[
                ("action", "mpu-uploadpart"),
                ("uploadId", upload_id),
                ("partNumber", &part_number.to_string()),
            ])
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(|e| Error::Transport(url.clone(), e))?;
        let response = ensure_ok("PUT", &url, response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(url.clone(), e))?;
        super::parse_json(&url, &body)
    }

    /// Stream `body` as a single-shot upload (files under the multipart part
    /// size threshold). Single attempt, same rationale as `upload_part`.
    pub async fn upload_single<S>(&self, user_data: &UserData, key: &str, body: S) -> Result<()>
    where
        S: Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + Sync + 'static,
    {
        let url = self.url(key);
        let response = self
            .streaming
            .put(&url)
            .header("authentication", &user_data.api_token)
            .query(&[("action", "single-upload")])
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(|e| Error::Transport(url.clone(), e))?;
        ensure_ok("PUT", &url, response).await?;
        Ok(())
    }

    /// Begin a streamed GET, returning the raw response so the caller can
    /// read `Content-Length` and drain the body chunk by chunk. Single
    /// attempt - the download worker retries forever around the whole call.
    pub async fn get(&self, user_data: &UserData, key: &str) -> Result<reqwest::Response> {
        self.get_url(user_data, &self.url(key)).await
    }

    /// Same as [`Self::get`], but against an already-absolute URL - used by
    /// download work orders, whose URL was built once at `initialize()` time
    /// from the R2 endpoint plus the job's output path, rather than a bare
    /// object key relative to this client's base URL.
    pub async fn get_url(&self, user_data: &UserData, url: &str) -> Result<reqwest::Response> {
        let response = self
            .streaming
            .get(url)
            .header("authentication", &user_data.api_token)
            .query(&[("action", "get")])
            .send()
            .await
            .map_err(|e| Error::Transport(url.to_owned(), e))?;
        ensure_ok("GET", url, response).await
    }
}

async fn ensure_ok(method: &str, url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(Error::Status {
            method: method.to_owned(),
            url: url.to_owned(),
            status: status.as_u16(),
            body,
        })
    }
}
