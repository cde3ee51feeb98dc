//! Severity scoring and the leaky risk integrator.

use nalgebra::{DMatrix, DVector};

use crate::numerics::mahalanobis;

/// Severity S = D / T where D is the Mahalanobis distance to the baseline.
///
/// A non-positive threshold (uninitialised or malformed state) scores 0
/// rather than dividing by zero.
pub fn calculate_severity(
    x: &DVector<f64>,
    mu: &DVector<f64>,
    cov_inv: &DMatrix<f64>,
    threshold: f64,
) -> f64 {
    if threshold <= 0.0 {
        return 0.0;
    }
    mahalanobis(x, mu, cov_inv) / threshold
}

/// Nonlinear leaky integrator over severity with anti-flap hysteresis.
///
/// Severities above 1 accumulate quadratically; benign ticks decay the
/// pool geometrically. The alert edge is evaluated on the post-increment,
/// pre-hysteresis value, after which the pool is halved (not zeroed) so a
/// sustained anomaly re-alerts instead of flapping every tick.
#[derive(Debug, Clone)]
pub struct RiskAccumulator {
    risk: f64,
    alert_threshold: f64,
}

impl RiskAccumulator {
    pub fn new(alert_threshold: f64) -> Self {
        Self {
            risk: 0.0,
            alert_threshold,
        }
    }

    /// Current accumulated risk.
    pub fn risk(&self) -> f64 {
        self.risk
    }

    /// Restore persisted risk (crash-consistent restart).
    pub fn restore(&mut self, risk: f64) {
        self.risk = risk.max(0.0);
    }

    /// Zero the pool (retrain path).
    pub fn reset(&mut self) {
        self.risk = 0.0;
    }

    /// Fold one severity into the pool. Returns `(risk, alert)` where
    /// `risk` is the post-hysteresis value carried into the next tick.
    pub fn update(&mut self, severity: f64) -> (f64, bool) {
        if severity > 1.0 {
            self.risk += 4.0 * (severity - 1.0).powi(2);
        } else {
            self.risk *= 0.95;
        }

        let alert = self.risk > self.alert_threshold;
        if alert {
            self.risk *= 0.5;
        }

        (self.risk, alert)
    }
}
