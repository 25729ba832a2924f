//! Builds the JSON "operations" list posted to the queue manager on upload
//! success, plus the frame-end derivation shared by the job-data block.
//!
//! The operations are opaque to the daemon - it emits them verbatim for the
//! render node to interpret - so each builder function below returns
//! `serde_json::Value` rather than a typed struct. Values that look like
//! template placeholders (`{job_id}`, `{node_folder}`, ...) are resolved by
//! the render node, not here.

use serde_json::{json, Value};

/// `job_info` as submitted with an upload request: everything needed to
/// both size the job-data block and assemble its operations list.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct JobInformation {
    pub frame_start: i64,
    pub frame_end: i64,
    pub frame_step: i64,
    pub batch_size: i64,
    pub name: String,
    pub render_passes: Value,
    pub render_format: String,
    pub render_engine: String,
    pub blender_version: String,
    pub blend_name: String,
    pub max_thumbnail_size: i64,
}

/// Effective end frame, accounting for batching and stepping.
///
/// - `batch_size > 1`: the node processes `batch_size` frames per task, so
///   the task count (and hence `end`) shrinks by that factor.
/// - `frame_step > 1` (only meaningful when `batch_size == 1`): frames are
///   sampled every `frame_step`, so `end` is the task index of the last
///   sampled frame, not the last frame itself.
/// - otherwise: `end` is the input end frame unchanged.
pub fn derive_frame_end(frame_start: i64, frame_end: i64, frame_step: i64, batch_size: i64) -> i64 {
    let total_frames = frame_end - frame_start + 1;

    if batch_size != 1 {
        frame_start + (total_frames / batch_size) - 1
    } else if frame_step > 1 {
        (frame_end - frame_start) / frame_step + frame_start
    } else {
        frame_end
    }
}

/// Assemble the full `operations` list for a completed upload.
pub fn build_operations(
    blend_file_name: &str,
    render_format: &str,
    max_thumbnail_size: i64,
    zip_hash: &str,
    frame_step: i64,
    api_token: &str,
) -> Vec<Value> {
    vec![
        stopwatch("start", "frame"),
        download_unzip(zip_hash, api_token),
        blender(blend_file_name, render_format, frame_step),
        thumbnails(max_thumbnail_size),
        r2_upload(api_token),
        stopwatch("stop", "frame"),
        octa_analytics("{node_task}", "{stopwatch_frame}"),
    ]
}

fn stopwatch(action: &str, name: &str) -> Value {
    json!({
        "operation": "stopwatch",
        "arguments": { "action": action, "name": name },
    })
}

fn download_unzip(zip_hash: &str, api_token: &str) -> Value {
    json!({
        "operation": "exe",
        "arguments": { "input": "python", "one_shot": true },
        "variables": [
            "assets/scripts/files/unzip.py",
            "--zip", "{node_folder}/{job_id}/input/package.zip",
            "--extract-folder", "{node_folder}/{job_id}/input/",
            "--url", format!(
                "{{r2_worker_endpoint}}/{{job_id}}/input/package.zip?octa_api_token={}",
                api_token
            ),
            "--hash", zip_hash,
            "--dont-ensure-exists",
        ],
    })
}

fn blender(blend_file_name: &str, render_format: &str, frame_step: i64) -> Value {
    let (frame_start_string, frame_end_string) = if frame_step > 1 {
        let start = "{job_start + ((node_task - job_start) * job_frame_step)}".to_owned();
        (start.clone(), start)
    } else {
        (
            "{job_start + (node_task-job_start) * job_batch_size}".to_owned(),
            "{job_start + (node_task-job_start+1) * job_batch_size - 1}".to_owned(),
        )
    };

    json!({
        "operation": "exe",
        "arguments": { "input": "{eval(f\"node_{job_blender_version}\")}" },
        "variables": [
            "-b", format!("{{node_folder}}/{{job_id}}/input/{}", blend_file_name),
            "-y",
            "-s", frame_start_string,
            "-e", frame_end_string,
            "-F", render_format,
            "-o", "{node_folder}/{job_id}/{str(node_gpu_index).replace(\",\", \"_\")}/output/",
            "-P", "/srv/sarfis-pro-node/assets/scripts/blender/octa.py",
            "-a",
            "--",
            "-enable_devices",
            "[{str(node_gpu_index).replace(\",\", \"_\")}]",
        ],
    })
}

fn thumbnails(max_size: i64) -> Value {
    json!({
        "operation": "exe",
        "arguments": { "input": "python" },
        "variables": [
            "assets/scripts/files/thumbnails.py",
            "-path", "{node_folder}/{job_id}/{str(node_gpu_index).replace(\",\", \"_\")}/output/",
            "-size", max_size.to_string(),
        ],
    })
}

fn r2_upload(api_token: &str) -> Value {
    json!({
        "operation": "exe",
        "arguments": { "input": "python" },
        "variables": [
            "assets/scripts/files/octa_r2_upload.py",
            "--folder", "{node_folder}/{job_id}/{str(node_gpu_index).replace(\",\", \"_\")}/output/",
            "--remote-path", "{job_id}/output/",
            "--api-token", api_token,
            "--remove-files",
        ],
    })
}

fn octa_analytics(frame: &str, duration: &str) -> Value {
    json!({
        "operation": "octa_analytics",
        "arguments": { "frame": frame, "duration": duration },
    })
}
