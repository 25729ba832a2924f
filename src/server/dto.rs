//! Request bodies accepted by the control-plane routes.

use serde::Deserialize;
use serde_json::Value;

use crate::transfer::JobInformation;

#[derive(Debug, Deserialize)]
pub struct CreateUploadRequest {
    pub local_file_path: String,
    pub job_information: JobInformation,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct CreateDownloadRequest {
    pub local_dir_path: String,
    pub job_id: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}
