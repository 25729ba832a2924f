//! Client for the farm's queue manager: job creation on upload completion,
//! job detail lookup at download initialization.
//!
//! Both calls go through a single envelope endpoint, `/qm/uber_api`, whose
//! body's top-level keys name the endpoint being invoked (`node_job`,
//! `job_details`); the response mirrors the same shape, `{endpoint: {status,
//! body}}`. A non-success `status` inside the envelope is treated the same
//! as a transport failure and retried. Every call also carries `Auth-Token`
//! plus the `Sarfis-Version`/`Sarfis-Soft-Version` pair the farm's queue
//! manager expects from any caller identifying itself.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::config::constants::PROTOCOL_VERSION;
use crate::transfer::UserData;

use super::{build_rpc_client, request_with_retries, Error, Result};

pub struct QueueManager {
    http: reqwest::Client,
}

impl QueueManager {
    pub fn new() -> Self {
        Self {
            http: build_rpc_client(),
        }
    }

    async fn call(&self, user_data: &UserData, envelope: Value) -> Result<Value> {
        let url = format!("{}/qm/uber_api", user_data.farm_host);
        request_with_retries("POST", &url, || async {
            let response = self
                .http
                .post(&url)
                .header("Auth-Token", &user_data.qm_auth_token)
                .header("Sarfis-Version", PROTOCOL_VERSION)
                .header("Sarfis-Soft-Version", PROTOCOL_VERSION)
                .json(&envelope)
                .send()
                .await
                .map_err(|e| Error::Transport(url.clone(), e))?;

            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::Transport(url.clone(), e))?;

            if !status.is_success() {
                return Err(Error::Status {
                    method: "POST".to_owned(),
                    url: url.clone(),
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }

            super::parse_json(&url, &body)
        })
        .await
    }

    fn unwrap_endpoint<T: DeserializeOwned>(
        &self,
        url: &str,
        endpoint: &'static str,
        envelope: Value,
    ) -> Result<T> {
        let result = envelope
            .get(endpoint)
            .cloned()
            .ok_or(Error::MissingEnvelopeResult(endpoint))?;
        super::parse_json(url, &serde_json::to_vec(&result).unwrap_or_default())
    }

    /// Posts a job-creation document built by the job-spec builder. The
    /// envelope's value is the document itself, passed through verbatim.
    pub async fn node_job(&self, user_data: &UserData, job: &impl Serialize) -> Result<()> {
        let envelope = self.call(user_data, json!({ "node_job": job })).await?;
        let _: Value = self.unwrap_endpoint(&user_data.farm_host, "node_job", envelope)?;
        Ok(())
    }

    /// Fetches job detail (frame range, batch size, render passes/format)
    /// used by a download's `initialize()`.
    pub async fn get_job_details(&self, user_data: &UserData, job_id: &str) -> Result<JobDetails> {
        let envelope = self
            .call(user_data, json!({ "job_details": { "job_id": job_id } }))
            .await?;
        self.unwrap_endpoint(&user_data.farm_host, "job_details", envelope)
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}

/// The subset of job detail the download path needs to enumerate output
/// files. Render passes are kept as opaque JSON since the daemon only walks
/// their `files` map, never interprets pass semantics.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct JobDetails {
    pub start: i64,
    pub end: i64,
    pub batch_size: Option<i64>,
    pub render_passes: std::collections::BTreeMap<String, RenderPass>,
    pub render_format: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RenderPass {
    pub files: std::collections::BTreeMap<String, String>,
}
