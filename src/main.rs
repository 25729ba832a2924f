//! Entry point for the `transfer-managerd` daemon: wires up logging, loads
//! configuration, starts the upload/download worker pools, and serves the
//! local control plane until the process is asked to shut down.

use std::sync::Arc;

use log::{info, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

use transfer_manager::clients::{QueueManager, R2Worker};
use transfer_manager::config::constants::LOG_FORMAT;
use transfer_manager::config::Config;
use transfer_manager::server::{self, AppState};
use transfer_manager::transfer::{TransferManager, TransferQueue};

const LOG_ROLLOVER_BYTES: u64 = 10 * 1024 * 1024;

fn init_logging(level: LevelFilter) {
    let log_path = std::env::temp_dir().join(transfer_manager::config::constants::LOG_FILE_NAME);

    let trigger = SizeTrigger::new(LOG_ROLLOVER_BYTES);
    let roller = FixedWindowRoller::builder()
        .base(1)
        .build(&format!("{}.{{}}", log_path.to_string_lossy()), 5)
        .expect("fixed-window roller pattern is always valid");
    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));

    let file = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_FORMAT)))
        .build(&log_path, Box::new(policy))
        .expect("couldn't open rolling log file");
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_FORMAT)))
        .build();

    let config = LogConfig::builder()
        .appender(Appender::builder().build("rolling_file", Box::new(file)))
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(
            Root::builder()
                .appender("rolling_file")
                .appender("stdout")
                .build(level),
        )
        .expect("logging configuration is always valid");

    log4rs::init_config(config).expect("couldn't initialize logger");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("couldn't load configuration, using defaults: {e}");
        Config::default()
    });

    init_logging(config.log_level);
    info!("starting transfer-managerd on port {}", config.control_plane_port);

    let manager = Arc::new(TransferManager::new());
    let r2 = Arc::new(R2Worker::new(config.r2_base_url.clone()));
    let queue_manager = Arc::new(QueueManager::new());

    let upload_queue = TransferQueue::new_upload(
        Arc::clone(&manager),
        Arc::clone(&r2),
        Arc::clone(&queue_manager),
        config.r2_base_url.clone(),
    );
    let download_queue = TransferQueue::new_download(
        Arc::clone(&manager),
        Arc::clone(&r2),
        Arc::clone(&queue_manager),
        config.r2_base_url.clone(),
    );
    upload_queue.start();
    download_queue.start();

    let state = AppState {
        manager,
        upload_queue: Arc::clone(&upload_queue),
        download_queue: Arc::clone(&download_queue),
        queue_manager,
        r2,
        r2_base_url: config.r2_base_url.clone(),
    };

    let shutdown_queues = (Arc::clone(&upload_queue), Arc::clone(&download_queue));
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal, stopping worker pools");
        shutdown_queues.0.shutdown();
        shutdown_queues.1.shutdown();
        std::process::exit(0);
    });

    server::run(config, state).await
}
