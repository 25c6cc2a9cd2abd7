//! System-wide default constants.
//!
//! Every value here is the built-in default for a field in
//! `SupervisorConfig`; grouped by the config section that overrides it.

// ============================================================================
// [supervisor]
// ============================================================================

/// Monitoring tick interval (seconds).
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

/// Recovery loop poll interval (seconds).
pub const RECOVERY_POLL_INTERVAL_SECS: u64 = 60;

/// Ceiling for the monitoring interval when ReduceLoad keeps doubling it (seconds).
pub const MAX_MONITORING_INTERVAL_SECS: u64 = 300;

/// Timeout applied to every health-check and restart callback (seconds).
pub const CALLBACK_TIMEOUT_SECS: u64 = 5;

/// Timeout for one host metrics sample (seconds).
pub const METRICS_TIMEOUT_SECS: u64 = 2;

/// How much tick history is retained (seconds). 43 200 = 12 hours.
pub const HISTORY_RETENTION_SECS: u64 = 43_200;

/// Window for the rolling error / recovery counters (seconds).
pub const ERROR_WINDOW_SECS: u64 = 300;

/// Fraction of history kept when CleanupResources trims the buffer.
pub const CLEANUP_RETAIN_FRACTION: f64 = 0.25;

// ============================================================================
// [health]
// ============================================================================

pub const CPU_WARNING_PERCENT: f64 = 70.0;
pub const CPU_CRITICAL_PERCENT: f64 = 85.0;
pub const MEMORY_WARNING_PERCENT: f64 = 70.0;
pub const MEMORY_CRITICAL_PERCENT: f64 = 85.0;
pub const DISK_WARNING_PERCENT: f64 = 80.0;
pub const DISK_CRITICAL_PERCENT: f64 = 90.0;

/// Error-score points per recent error.
pub const ERROR_SCORE_PER_ERROR: u32 = 2;

/// Upper bound on the error score.
pub const ERROR_SCORE_CAP: u32 = 6;

/// Total-score cut-offs, most severe first.
pub const FAILURE_SCORE: u32 = 8;
pub const CRITICAL_SCORE: u32 = 5;
pub const WARNING_SCORE: u32 = 3;
pub const GOOD_SCORE: u32 = 1;

/// Filesystem whose usage feeds the disk score.
pub const DISK_PATH: &str = "/";

// ============================================================================
// [[components]]
// ============================================================================

/// Consecutive failed checks before a component is marked `Error`.
pub const MAX_FAILURES: u32 = 3;

/// Free-space floor for `kind = "disk"` probes (MiB).
pub const DISK_PROBE_MIN_FREE_MB: u64 = 500;

// ============================================================================
// [server] / [logging]
// ============================================================================

pub const SERVER_ADDR: &str = "127.0.0.1:9400";

pub const LOG_DIRECTORY: &str = "./logs";

pub const LOG_FILE_PREFIX: &str = "opwatch.log";

/// Cap on `GET /api/v1/history?limit=`.
pub const HISTORY_QUERY_MAX: usize = 1_440;
