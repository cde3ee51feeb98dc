//! CUSUM drift detection and model divergence.

use nalgebra::DVector;

/// One-sided CUSUM change detector over the severity stream.
///
/// The statistic accumulates severity in excess of the slack k and alarms
/// when it crosses H, then resets to exactly 0 so consecutive drift events
/// each require fresh evidence.
#[derive(Debug, Clone)]
pub struct DriftDetector {
    c: f64,
    k: f64,
    threshold: f64,
}

impl DriftDetector {
    pub fn new(k: f64, threshold: f64) -> Self {
        Self {
            c: 0.0,
            k,
            threshold,
        }
    }

    /// Current CUSUM statistic.
    pub fn statistic(&self) -> f64 {
        self.c
    }

    /// Fold one severity in; returns true on a drift event.
    pub fn update(&mut self, severity: f64) -> bool {
        self.c = (self.c + severity - self.k).max(0.0);

        let drift = self.c > self.threshold;
        if drift {
            self.c = 0.0;
        }
        drift
    }
}

/// L2 divergence between the short- and long-model means.
pub fn mean_divergence(mu_short: &DVector<f64>, mu_long: &DVector<f64>) -> f64 {
    (mu_short - mu_long).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::{CUSUM_K, CUSUM_THRESHOLD};

    #[test]
    fn test_benign_severity_stays_at_zero() {
        let mut detector = DriftDetector::new(CUSUM_K, CUSUM_THRESHOLD);
        for _ in 0..100 {
            assert!(!detector.update(0.0));
            assert_eq!(detector.statistic(), 0.0);
        }
    }

    #[test]
    fn test_sustained_shift_trips_and_resets_exactly() {
        let mut detector = DriftDetector::new(CUSUM_K, CUSUM_THRESHOLD);

        // Severity 0.55 accumulates 0.5 per tick; the 21st crossing of
        // 10.0 fires the drift edge.
        let mut drift_at = None;
        for tick in 1..=30 {
            if detector.update(0.55) {
                drift_at = Some(tick);
                break;
            }
        }
        assert_eq!(drift_at, Some(21));
        assert_eq!(detector.statistic(), 0.0);
    }

    #[test]
    fn test_statistic_never_negative() {
        let mut detector = DriftDetector::new(0.5, CUSUM_THRESHOLD);
        detector.update(0.1);
        assert_eq!(detector.statistic(), 0.0);
    }

    #[test]
    fn test_mean_divergence() {
        let a = DVector::from_vec(vec![1.0, 2.0]);
        let b = DVector::from_vec(vec![4.0, 6.0]);
        assert!((mean_divergence(&a, &b) - 5.0).abs() < 1e-12);
        assert_eq!(mean_divergence(&a, &a), 0.0);
    }
}
