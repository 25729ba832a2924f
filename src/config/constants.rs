//! Program-level configuration constants.

/// Default port the local control-plane HTTP server binds on loopback.
pub const DEFAULT_CONTROL_PLANE_PORT: u16 = 7780;

/// Fallback farm host used when a request omits the `farm_host` header.
pub const DEFAULT_FARM_HOST: &str = "https://farm.octaspace.internal";

/// Default object-storage worker base URL, overridable via
/// `TRANSFER_MANAGER_R2_BASE_URL`.
pub const DEFAULT_R2_BASE_URL: &str = "https://r2-worker.artem-teslenko.workers.dev";

/// Logging output pattern used by the rolling file appender.
pub const LOG_FORMAT: &str = "[{d(%Y-%m-%d %H:%M:%S %Z)(utc)}][{l}][{t}] {m}{n}";

/// Name of the rolling log file created in the OS temp directory.
pub const LOG_FILE_NAME: &str = "transfer-manager.log";

/// Bytes of the rolling log file `GET /api/logs` tails back to the caller.
pub const LOG_TAIL_BYTES: usize = 64 * 1024;

/// Maximum size, in bytes, a single upload work order's object-storage part
/// may cover before the upload is split into additional multipart parts.
pub const UPLOAD_PART_SIZE: u64 = 25 * 1024 * 1024;

/// Size of each chunk read from disk and handed to the HTTP client while
/// streaming an upload. Chunk boundaries double as pause/cancel checkpoints.
pub const UPLOAD_CHUNK_SIZE: usize = 1024 * 1024;

/// Buffer size used while streaming a file through the MD5 hasher.
pub const HASH_READ_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Seconds to sleep between retry attempts of a failed upload work order.
pub const UPLOAD_RETRY_INTERVAL_SECS: u64 = 3;

/// Seconds to sleep between retry attempts of a failed download work order.
pub const DOWNLOAD_RETRY_INTERVAL_SECS: u64 = 5;

/// Ceiling on upload work order retries before the order is abandoned and the
/// owning transfer is failed. Downloads retry unbounded by design (spec open
/// question, confirmed unchanged); uploads get a cap plus jitter per the
/// rewrite recommendation.
pub const UPLOAD_MAX_RETRIES: u32 = 50;

/// Seconds a worker sleeps when no work order is currently available.
pub const QUEUE_IDLE_POLL_SECS: u64 = 1;

/// Upper bound on the number of workers the upload queue will ramp up to.
pub const UPLOAD_MAX_WORKERS: usize = 6;

/// Workers the upload queue starts with before any ramp-up occurs.
pub const UPLOAD_START_WORKERS: usize = 1;

/// Fixed worker count for the download queue (no ramp/back-off).
pub const DOWNLOAD_WORKER_COUNT: usize = 4;

/// Number of samples `TransferSpeed` retains for its sliding-window average.
pub const TRANSFER_SPEED_WINDOW: usize = 20;

/// Connect/read timeout for short control-plane style RPCs (create/complete/
/// abort/job-detail). Data-plane PUT/GET calls use a longer read timeout and
/// rely on the worker loop, not this client, for retry.
pub const RPC_CONNECT_TIMEOUT_SECS: u64 = 15;
pub const RPC_READ_TIMEOUT_SECS: u64 = 15;
pub const STREAMING_READ_TIMEOUT_SECS: u64 = 300;

/// Bounded retry count for short control-plane RPCs (create/complete/abort/
/// job-detail/node-job).
pub const RPC_MAX_RETRIES: u32 = 3;

/// Version advertised by `/api/transfer_manager_info` and checked against the
/// `Transfer-Manager-Version` request header.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");
