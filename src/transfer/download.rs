//! Download-specific transfer state: enumerate a render job's expected
//! outputs and fetch each into a local directory tree.

use std::path::PathBuf;

use crate::clients::QueueManager;

use super::user_data::UserData;
use super::work_order::WorkOrder;

/// Render-format-to-extension table for the composited "beauty" frame when
/// no render pass declares it explicitly. Mirrors the render engine's own
/// image format naming.
const IMAGE_TYPE_TO_EXTENSION: &[(&str, &str)] = &[
    ("BMP", "bmp"),
    ("IRIS", "iris"),
    ("PNG", "png"),
    ("JPEG", "jpg"),
    ("JPEG2000", "jp2"),
    ("TARGA", "tga"),
    ("TARGA_RAW", "tga"),
    ("CINEON", "cin"),
    ("DPX", "dpx"),
    ("OPEN_EXR", "exr"),
    ("OPEN_EXR_MULTILAYER", "exr"),
    ("HDR", "hdr"),
    ("TIFF", "tif"),
    ("WEBP", "webp"),
];

fn extension_for_render_format(render_format: &str) -> &'static str {
    IMAGE_TYPE_TO_EXTENSION
        .iter()
        .find(|(key, _)| *key == render_format)
        .map(|(_, ext)| *ext)
        .unwrap_or("unknown")
}

pub struct DownloadState {
    pub local_dir_path: PathBuf,
    pub job_id: String,
}

impl DownloadState {
    pub fn new(local_dir_path: PathBuf, job_id: String) -> Self {
        Self {
            local_dir_path,
            job_id,
        }
    }

    /// Fetches job detail, derives the effective frame range (batched jobs
    /// run `batch_size` frames per task, so the frame count is multiplied
    /// out before deriving `end`), then creates one work order per declared
    /// render-pass output file per frame plus the composited frame. Render
    /// formats this daemon doesn't recognize still get composite work
    /// orders, just with an `"unknown"` extension rather than being skipped.
    pub async fn initialize(
        &self,
        queue_manager: &QueueManager,
        r2_base_url: &str,
        user_data: &UserData,
    ) -> super::Result<Vec<WorkOrder>> {
        let job = queue_manager.get_job_details(user_data, &self.job_id).await?;

        let frame_start = job.start;
        let mut frame_end = job.end;
        if let Some(batch_size) = job.batch_size {
            if batch_size > 1 {
                let total_batches = frame_end - frame_start + 1;
                let total_frames = batch_size * total_batches;
                frame_end = frame_start + total_frames - 1;
            }
        }

        let output_dir = self.local_dir_path.join(&self.job_id);
        tokio::fs::create_dir_all(&output_dir).await?;

        let mut orders = Vec::new();
        let mut number = 0u32;

        for pass in job.render_passes.values() {
            for (file_name, file_ext) in &pass.files {
                let pass_dir = output_dir.join(file_name);
                tokio::fs::create_dir_all(&pass_dir).await?;

                for frame in frame_start..=frame_end {
                    let frame_name = format!("{:04}.{}", frame, file_ext);
                    let url = format!(
                        "{r2_base_url}/{}/output/{file_name}/{frame_name}",
                        self.job_id
                    );
                    let local_path = pass_dir.join(&frame_name);
                    let rel_path = format!("{file_name}/{frame_name}");
                    orders.push(WorkOrder::new_download(number, url, local_path, rel_path));
                    number += 1;
                }
            }
        }

        let composite_ext = extension_for_render_format(&job.render_format);
        for frame in frame_start..=frame_end {
            let file_name = format!("{:04}.{composite_ext}", frame);
            let url = format!("{r2_base_url}/{}/output/{file_name}", self.job_id);
            let local_path = output_dir.join(&file_name);
            orders.push(WorkOrder::new_download(number, url, local_path, file_name));
            number += 1;
        }

        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_render_format_falls_back_to_unknown() {
        assert_eq!(extension_for_render_format("NONSENSE"), "unknown");
        assert_eq!(extension_for_render_format("OPEN_EXR"), "exr");
    }
}
