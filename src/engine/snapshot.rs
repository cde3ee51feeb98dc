//! Immutable per-tick state snapshots for observers.
//!
//! One snapshot is published per processed tick, always reflecting the
//! post-update state of that tick, and delivered to observers in tick
//! order. Observers receive value copies; nothing here aliases engine
//! state.

use std::collections::HashMap;

use serde::Serialize;

/// Operational status derived from the risk pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertStatus {
    /// Risk at or below the elevated threshold.
    Normal,
    /// Risk above the elevated threshold but no alert edge this tick.
    Elevated,
    /// The risk alert edge fired this tick.
    Anomaly,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Elevated => write!(f, "Elevated"),
            Self::Anomaly => write!(f, "Anomaly"),
        }
    }
}

/// What the engine publishes after each tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EngineSnapshot {
    /// Baseline learning in progress.
    Training {
        /// Samples accumulated so far.
        progress: usize,
        /// Samples required before the models initialise.
        target: usize,
        /// Raw metrics from this tick.
        metrics: HashMap<String, f64>,
    },
    /// Scoring against the learned baseline.
    Monitoring {
        /// Raw metrics from this tick.
        metrics: HashMap<String, f64>,
        /// Normalised Mahalanobis distance against the long model.
        severity: f64,
        /// Accumulated risk after this tick.
        risk: f64,
        status: AlertStatus,
        /// L2 distance between the short and long model means.
        divergence: f64,
        /// True when the long model's covariance inversion is unreliable.
        is_frozen: bool,
    },
}

impl EngineSnapshot {
    pub fn is_training(&self) -> bool {
        matches!(self, Self::Training { .. })
    }
}
