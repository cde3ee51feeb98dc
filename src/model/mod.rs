//! Dual-timescale Gaussian baseline model.
//!
//! One parametrised type serves both horizons: the engine instantiates a
//! short model (lambda = 0.01) that re-tracks within minutes and a long
//! model (lambda = 0.001) that anchors severity scoring. A model is
//! created empty, promoted by a training batch, mutated online while
//! healthy, and replaced wholesale by a retrain.

pub mod updates;

use nalgebra::{DMatrix, DVector};
use statrs::statistics::{Data, OrderStatistics};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::defaults::THRESHOLD_FLOOR;
use crate::numerics::{mahalanobis, safe_invert};

/// Model errors surfaced at the engine boundary.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("training batch is empty")]
    EmptyBatch,

    #[error("training batch row {row} has dimension {got}, expected {expected}")]
    RaggedBatch {
        row: usize,
        got: usize,
        expected: usize,
    },
}

/// The matrix triple owned by an initialized model.
///
/// `cov` is always the raw (unregularised) exponentially-weighted
/// covariance; `cov_inv` is the inverse of its regularised form, produced
/// by the same `safe_invert` call that decided the frozen flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMatrices {
    pub mu: DVector<f64>,
    pub cov: DMatrix<f64>,
    pub cov_inv: DMatrix<f64>,
}

/// Exponentially-weighted Gaussian baseline with a fixed training-time
/// severity threshold.
#[derive(Debug, Clone)]
pub struct StatisticalModel {
    lambda: f64,
    epsilon_base: f64,
    matrices: Option<ModelMatrices>,
    threshold: f64,
    frozen: bool,
}

impl StatisticalModel {
    /// Create an uninitialised model with the given forgetting factor.
    pub fn new(lambda: f64, epsilon_base: f64) -> Self {
        Self {
            lambda,
            epsilon_base,
            matrices: None,
            threshold: 0.0,
            frozen: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.matrices.is_some()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Training-time threshold T (0.0 before initialisation).
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn matrices(&self) -> Option<&ModelMatrices> {
        self.matrices.as_ref()
    }

    /// Initialise from a training batch (rows are samples).
    ///
    /// mu is the column mean, Sigma the unbiased sample covariance, and T
    /// the 99th percentile of the batch's own Mahalanobis distances,
    /// floored at a tiny positive so a constant batch still scores 0
    /// severity instead of dividing by zero.
    pub fn init_from_batch(&mut self, batch: &[DVector<f64>]) -> Result<(), ModelError> {
        let n = batch.len();
        let first = batch.first().ok_or(ModelError::EmptyBatch)?;
        let d = first.len();
        for (row, x) in batch.iter().enumerate() {
            if x.len() != d {
                return Err(ModelError::RaggedBatch {
                    row,
                    got: x.len(),
                    expected: d,
                });
            }
        }

        let mut mu = DVector::zeros(d);
        for x in batch {
            mu += x;
        }
        mu /= n as f64;

        // Unbiased sample covariance (divisor n - 1); degenerate single-row
        // batches fall back to a zero matrix that regularisation handles.
        let mut cov = DMatrix::zeros(d, d);
        if n > 1 {
            for x in batch {
                let diff = x - &mu;
                cov += &diff * diff.transpose();
            }
            cov /= (n - 1) as f64;
        }

        let inversion = safe_invert(&cov, self.epsilon_base);
        self.frozen = inversion.frozen;
        if inversion.frozen {
            warn!(lambda = self.lambda, "model initialised frozen: training covariance ill-conditioned");
        }

        let distances: Vec<f64> = batch
            .iter()
            .map(|x| mahalanobis(x, &mu, &inversion.inverse))
            .collect();
        let mut data = Data::new(distances);
        self.threshold = data.percentile(99).max(THRESHOLD_FLOOR);

        self.matrices = Some(ModelMatrices {
            mu,
            cov,
            cov_inv: inversion.inverse,
        });

        debug!(
            lambda = self.lambda,
            samples = n,
            dim = d,
            threshold = self.threshold,
            frozen = self.frozen,
            "model initialised from batch"
        );
        Ok(())
    }

    /// Gated online update.
    ///
    /// No-op when uninitialised, frozen, or the sample is contaminated
    /// (severity at or above `severity_limit`; the engine applies the same
    /// gate globally, this one is defence in depth). The covariance is
    /// advanced with the pre-update mean, then the mean, then the inverse
    /// is re-derived; the triple commits only when inversion stays stable,
    /// otherwise the model freezes and keeps its previous state.
    pub fn update(&mut self, x: &DVector<f64>, severity: f64, severity_limit: f64) {
        if self.frozen || severity >= severity_limit {
            return;
        }
        let Some(current) = self.matrices.as_ref() else {
            return;
        };

        let new_cov = updates::update_covariance(&current.cov, &current.mu, x, self.lambda);
        let new_mu = updates::update_mean(&current.mu, x, self.lambda);

        let inversion = safe_invert(&new_cov, self.epsilon_base);
        if inversion.frozen {
            self.frozen = true;
            warn!(
                lambda = self.lambda,
                "online covariance became unstable, freezing model updates"
            );
            return;
        }

        self.matrices = Some(ModelMatrices {
            mu: new_mu,
            cov: new_cov,
            cov_inv: inversion.inverse,
        });
    }

    /// Deep-copy another model's matrix triple into this one.
    ///
    /// Used by the drift snap: the short model adopts the long baseline to
    /// re-track faster. The threshold is deliberately left untouched.
    pub fn snap_to(&mut self, other: &Self) {
        if let Some(matrices) = other.matrices.as_ref() {
            self.matrices = Some(matrices.clone());
        }
    }

    /// Restore a persisted model (matrices and threshold).
    pub fn restore(&mut self, matrices: ModelMatrices, threshold: f64) {
        self.matrices = Some(matrices);
        self.threshold = threshold;
        self.frozen = false;
    }

    /// Drop all learned state, returning the model to uninitialised.
    pub fn reset(&mut self) {
        self.matrices = None;
        self.threshold = 0.0;
        self.frozen = false;
    }
}
