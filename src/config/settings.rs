//! Runtime configuration loaded from TOML.
//!
//! Every tuning knob of the statistical core lives here with a default
//! from [`super::defaults`], so a missing or partial `sentinel.toml` is
//! always valid. Validation failures are startup-fatal by design: a bad
//! feature order or forgetting factor silently corrupts the baseline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::defaults;

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("feature order is empty")]
    EmptyFeatureOrder,

    #[error("feature dimension {0} exceeds maximum of {1}")]
    FeatureDimension(usize, usize),

    #[error("forgetting factor {name} = {value} must be in (0, 1)")]
    ForgettingFactor { name: &'static str, value: f64 },

    #[error("sample rate {0} Hz must be positive and finite")]
    SampleRate(f64),

    #[error("smoothing window must be at least 1")]
    SmoothingWindow,

    #[error("training window must cover at least 2 samples, got {0}")]
    TrainingWindow(usize),
}

/// Complete runtime configuration for the sentinel process.
///
/// Loading order: `SENTINEL_CONFIG` env var path, then `sentinel.toml` in
/// the working directory, then built-in defaults. CLI flags override the
/// loaded values in `main`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SentinelConfig {
    /// Base directory for persisted models, state, and logs.
    pub base_dir: PathBuf,

    /// Training window in seconds (ticks at 1 Hz).
    pub training_seconds: usize,

    /// Forgetting factor of the short-horizon model.
    pub lambda_short: f64,

    /// Forgetting factor of the long-horizon baseline model.
    pub lambda_long: f64,

    /// Base diagonal regularisation for covariance inversion.
    pub epsilon_base: f64,

    /// Condition-number ceiling for a direct inverse.
    pub max_condition_number: f64,

    /// Severity at or above which model updates are skipped.
    pub contamination_limit: f64,

    /// Accumulated risk above which an anomaly alert fires.
    pub risk_alert_threshold: f64,

    /// CUSUM slack parameter.
    pub cusum_k: f64,

    /// CUSUM alarm threshold.
    pub cusum_threshold: f64,

    /// Rolling-window length of the smoother.
    pub smoothing_window: usize,

    /// Scheduler frequency in Hz.
    pub sample_rate_hz: f64,

    /// Feature order, declared once and immutable for the process lifetime.
    pub feature_keys: Vec<String>,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            training_seconds: defaults::DEFAULT_TRAINING_SECONDS,
            lambda_short: defaults::LAMBDA_SHORT,
            lambda_long: defaults::LAMBDA_LONG,
            epsilon_base: defaults::EPSILON_BASE,
            max_condition_number: defaults::MAX_CONDITION_NUMBER,
            contamination_limit: defaults::CONTAMINATION_LIMIT,
            risk_alert_threshold: defaults::RISK_ALERT_THRESHOLD,
            cusum_k: defaults::CUSUM_K,
            cusum_threshold: defaults::CUSUM_THRESHOLD,
            smoothing_window: defaults::SMOOTHING_WINDOW,
            sample_rate_hz: defaults::SAMPLE_RATE_HZ,
            feature_keys: defaults::DEFAULT_FEATURE_KEYS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
        }
    }
}

/// `<home>/.sentinel`, falling back to a relative path when no home
/// directory is resolvable (containers, stripped-down service users).
fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .map_or_else(|| PathBuf::from(".sentinel"), |home| home.join(".sentinel"))
}

impl SentinelConfig {
    /// Load configuration using the standard precedence.
    ///
    /// 1. `explicit` path (from the CLI), if given
    /// 2. `SENTINEL_CONFIG` environment variable
    /// 3. `sentinel.toml` in the current working directory
    /// 4. Built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(env_path) = std::env::var("SENTINEL_CONFIG") {
            return Self::from_file(Path::new(&env_path));
        }

        let cwd_path = Path::new("sentinel.toml");
        if cwd_path.exists() {
            return Self::from_file(cwd_path);
        }

        info!("no sentinel.toml found, using built-in defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a specific TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Validate cross-field invariants. Called on every load path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feature_keys.is_empty() {
            return Err(ConfigError::EmptyFeatureOrder);
        }
        if self.feature_keys.len() > defaults::MAX_FEATURE_DIM {
            return Err(ConfigError::FeatureDimension(
                self.feature_keys.len(),
                defaults::MAX_FEATURE_DIM,
            ));
        }
        for (name, value) in [
            ("lambda_short", self.lambda_short),
            ("lambda_long", self.lambda_long),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::ForgettingFactor { name, value });
            }
        }
        if !(self.sample_rate_hz > 0.0 && self.sample_rate_hz.is_finite()) {
            return Err(ConfigError::SampleRate(self.sample_rate_hz));
        }
        if self.smoothing_window == 0 {
            return Err(ConfigError::SmoothingWindow);
        }
        if self.training_seconds < 2 {
            return Err(ConfigError::TrainingWindow(self.training_seconds));
        }
        Ok(())
    }

    /// Feature vector dimension d.
    pub fn feature_dim(&self) -> usize {
        self.feature_keys.len()
    }
}
