//! Exponentially-weighted online update rules.
//!
//! Both updates use the pre-update mean: the rank-one covariance term is
//! built from the same mu the incoming sample is compared against, and the
//! mean moves afterwards. Callers must preserve that ordering.

use nalgebra::{DMatrix, DVector};

/// mu_{t+1} = (1 - lambda) * mu_t + lambda * x_t
pub fn update_mean(mu: &DVector<f64>, x: &DVector<f64>, lambda: f64) -> DVector<f64> {
    mu * (1.0 - lambda) + x * lambda
}

/// Sigma_{t+1} = (1 - lambda) * Sigma_t + lambda * (x_t - mu_t)(x_t - mu_t)^T
///
/// `mu` is the pre-update mean mu_t.
pub fn update_covariance(
    cov: &DMatrix<f64>,
    mu: &DVector<f64>,
    x: &DVector<f64>,
    lambda: f64,
) -> DMatrix<f64> {
    let diff = x - mu;
    let rank_one = &diff * diff.transpose();
    cov * (1.0 - lambda) + rank_one * lambda
}
