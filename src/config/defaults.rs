//! System-wide default constants.
//!
//! Centralises the tuning knobs of the statistical core so they are
//! discoverable in one place. Every value here can be overridden via
//! `sentinel.toml` or CLI flags; see [`crate::config::SentinelConfig`].

// ============================================================================
// Training
// ============================================================================

/// Default training window (seconds). 1 800 ticks at 1 Hz = 30 minutes.
pub const DEFAULT_TRAINING_SECONDS: usize = 1_800;

// ============================================================================
// Statistical Model
// ============================================================================

/// Forgetting factor for the short-horizon model (reacts within minutes).
pub const LAMBDA_SHORT: f64 = 0.01;

/// Forgetting factor for the long-horizon baseline model.
pub const LAMBDA_LONG: f64 = 0.001;

/// Base diagonal regularisation added before covariance inversion.
pub const EPSILON_BASE: f64 = 1e-4;

/// Maximum 2-norm condition number accepted for a direct inverse.
pub const MAX_CONDITION_NUMBER: f64 = 1e6;

/// Retries inside `safe_invert`, each scaling epsilon by 10.
pub const INVERSION_RETRIES: usize = 5;

/// Floor applied to the training threshold T so severity never divides by 0.
pub const THRESHOLD_FLOOR: f64 = 1e-9;

// ============================================================================
// Anomaly & Contamination
// ============================================================================

/// Severity at or above which a sample is too anomalous to learn from.
pub const CONTAMINATION_LIMIT: f64 = 0.8;

/// Accumulated risk above which an anomaly alert fires.
pub const RISK_ALERT_THRESHOLD: f64 = 20.0;

/// Risk above which status reads Elevated (below the alert threshold).
pub const RISK_ELEVATED_THRESHOLD: f64 = 5.0;

// ============================================================================
// Drift (CUSUM)
// ============================================================================

/// CUSUM slack parameter k.
pub const CUSUM_K: f64 = 0.05;

/// CUSUM alarm threshold H.
pub const CUSUM_THRESHOLD: f64 = 10.0;

// ============================================================================
// Pipeline
// ============================================================================

/// Rolling-window length of the pre-model smoother (samples).
pub const SMOOTHING_WINDOW: usize = 5;

/// Scheduler tick frequency (Hz).
pub const SAMPLE_RATE_HZ: f64 = 1.0;

/// Hard cap on the feature vector dimension.
pub const MAX_FEATURE_DIM: usize = 10;

/// Canonical feature order for the host collector.
pub const DEFAULT_FEATURE_KEYS: [&str; 7] = [
    "cpu_percent",
    "ram_percent",
    "disk_read_rate",
    "disk_write_rate",
    "net_bytes_sent_rate",
    "net_bytes_recv_rate",
    "cpu_temperature",
];

// ============================================================================
// Observer Channel
// ============================================================================

/// Bounded capacity of the snapshot broadcast channel. Lagged observers
/// lose the oldest snapshots rather than backpressuring the worker.
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// Bounded capacity of the engine command channel.
pub const COMMAND_CHANNEL_CAPACITY: usize = 8;

// ============================================================================
// Scheduler
// ============================================================================

/// Bounded wait when joining the scheduler worker on stop (seconds).
pub const SCHEDULER_STOP_TIMEOUT_SECS: u64 = 2;
