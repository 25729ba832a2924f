//! End-to-end upload tests against the in-process control plane and a
//! hand-rolled mock standing in for the R2 worker and the queue manager.
//!
//! Covers the two literal end-to-end scenarios from the spec: a tiny
//! single-part upload, and a multipart upload whose part boundaries match
//! the spec's worked example exactly.

mod common;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{test, web, App};
use serde_json::json;
use uuid::Uuid;

use transfer_manager::clients::{QueueManager, R2Worker};
use transfer_manager::config::Config;
use transfer_manager::server::{self, AppState};
use transfer_manager::transfer::{TransferManager, TransferQueue};

use common::mock_remote;

fn job_information() -> serde_json::Value {
    json!({
        "frame_start": 1, "frame_end": 1, "frame_step": 1, "batch_size": 1,
        "name": "job", "render_passes": {}, "render_format": "PNG",
        "render_engine": "CYCLES", "blender_version": "4.0",
        "blend_name": "scene.blend", "max_thumbnail_size": 1024,
    })
}

/// Polls `/api/transfers/{id}` until it reaches `success` or `failure`,
/// mirroring how the UI panel would observe completion (spec §7:
/// post-creation errors are only observable by polling).
macro_rules! wait_for_terminal_status {
    ($app:expr, $id:expr) => {{
        let mut detail = None;
        for _ in 0..200 {
            let req = test::TestRequest::get().uri(&format!("/api/transfers/{}", $id)).to_request();
            let current: serde_json::Value = test::call_and_read_body_json(&$app, req).await;
            match current["status"].as_str() {
                Some("success") | Some("failure") => {
                    detail = Some(current);
                    break;
                }
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
        detail.unwrap_or_else(|| panic!("transfer {} never reached a terminal status", $id))
    }};
}

#[actix_web::test]
async fn tiny_upload_is_single_part_and_posts_a_job() {
    let remote = mock_remote::start();

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("package.zip");
    tokio::fs::write(&file_path, vec![0u8; 1_048_576]).await.unwrap();

    let manager = Arc::new(TransferManager::new());
    let r2 = Arc::new(R2Worker::new(remote.base_url.clone()));
    let queue_manager = Arc::new(QueueManager::new());
    let upload_queue = TransferQueue::new_upload(
        Arc::clone(&manager),
        Arc::clone(&r2),
        Arc::clone(&queue_manager),
        remote.base_url.clone(),
    );
    let download_queue = TransferQueue::new_download(
        Arc::clone(&manager),
        Arc::clone(&r2),
        Arc::clone(&queue_manager),
        remote.base_url.clone(),
    );
    upload_queue.start();

    let state = AppState {
        manager,
        upload_queue,
        download_queue,
        queue_manager,
        r2,
        r2_base_url: remote.base_url.clone(),
    };

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .app_data(web::Data::new(Config::default()))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/upload")
        .insert_header(("farm_host", remote.base_url.as_str()))
        .insert_header(("api_token", "tok"))
        .insert_header(("qm_auth_token", "qmtok"))
        .set_json(json!({
            "local_file_path": file_path.to_string_lossy(),
            "job_information": job_information(),
            "metadata": {},
        }))
        .to_request();
    let id: Uuid = test::call_and_read_body_json(&app, req).await;

    let detail = wait_for_terminal_status!(app, id);
    assert_eq!(detail["status"], "success");
    assert_eq!(detail["work_orders"].as_array().unwrap().len(), 1);
    assert_eq!(detail["work_orders"][0]["is_single_upload"], true);

    let node_jobs = remote.node_jobs();
    assert_eq!(node_jobs.len(), 1);
    assert_eq!(node_jobs[0]["job_data"]["archive_size"], 1_048_576);
    assert!(remote.completed_parts().is_none(), "single uploads never call mpu-complete");
}

#[actix_web::test]
async fn sixty_megabyte_upload_splits_into_three_parts_with_sorted_etags() {
    let remote = mock_remote::start();

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("package.zip");
    tokio::fs::write(&file_path, vec![7u8; 60_000_000]).await.unwrap();

    let manager = Arc::new(TransferManager::new());
    let r2 = Arc::new(R2Worker::new(remote.base_url.clone()));
    let queue_manager = Arc::new(QueueManager::new());
    let upload_queue = TransferQueue::new_upload(
        Arc::clone(&manager),
        Arc::clone(&r2),
        Arc::clone(&queue_manager),
        remote.base_url.clone(),
    );
    let download_queue = TransferQueue::new_download(
        Arc::clone(&manager),
        Arc::clone(&r2),
        Arc::clone(&queue_manager),
        remote.base_url.clone(),
    );
    upload_queue.start();

    let state = AppState {
        manager,
        upload_queue,
        download_queue,
        queue_manager,
        r2,
        r2_base_url: remote.base_url.clone(),
    };

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .app_data(web::Data::new(Config::default()))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/upload")
        .insert_header(("farm_host", remote.base_url.as_str()))
        .insert_header(("api_token", "tok"))
        .insert_header(("qm_auth_token", "qmtok"))
        .set_json(json!({
            "local_file_path": file_path.to_string_lossy(),
            "job_information": job_information(),
            "metadata": {},
        }))
        .to_request();
    let id: Uuid = test::call_and_read_body_json(&app, req).await;

    let detail = wait_for_terminal_status!(app, id);
    assert_eq!(detail["status"], "success");

    let work_orders = detail["work_orders"].as_array().unwrap();
    assert_eq!(work_orders.len(), 3);
    let expected = [(0u64, 26_214_400u64, 1u32), (26_214_400, 26_214_400, 2), (52_428_800, 7_571_200, 3)];
    for (wo, (offset, size, part_number)) in work_orders.iter().zip(expected) {
        assert_eq!(wo["offset"], offset);
        assert_eq!(wo["size"], size);
        assert_eq!(wo["part_number"], part_number);
        assert_eq!(wo["is_single_upload"], false);
    }

    let parts = remote.completed_parts().expect("mpu-complete was called");
    let part_numbers: Vec<u64> = parts.iter().map(|p| p["partNumber"].as_u64().unwrap()).collect();
    assert_eq!(part_numbers, vec![1, 2, 3]);

    assert_eq!(remote.node_jobs().len(), 1);
    assert_eq!(remote.node_jobs()[0]["job_data"]["archive_size"], 60_000_000u64);
    assert_eq!(remote.abort_count(), 0);
}
