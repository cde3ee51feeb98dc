//! Numerical primitives for the statistical core.
//!
//! Everything here is a pure function over `nalgebra` types. The
//! covariance-inversion guard rails live in [`stability`]; this module
//! holds the distance and regularisation helpers shared by the model and
//! the detectors.

mod stability;

pub use stability::{safe_invert, Inversion};

use nalgebra::{DMatrix, DVector};

/// Mahalanobis distance D = sqrt((x - mu)^T * cov_inv * (x - mu)).
///
/// Floating-point error can drive the quadratic form a hair below zero for
/// x ≈ mu; the form is clamped at 0 before the square root so the distance
/// is always finite and non-negative.
pub fn mahalanobis(x: &DVector<f64>, mu: &DVector<f64>, cov_inv: &DMatrix<f64>) -> f64 {
    let delta = x - mu;
    let m_squared = delta.dot(&(cov_inv * &delta));
    m_squared.max(0.0).sqrt()
}

/// Add epsilon to the diagonal: cov + epsilon * I.
pub fn regularise(cov: &DMatrix<f64>, epsilon: f64) -> DMatrix<f64> {
    let mut reg = cov.clone();
    for i in 0..reg.nrows().min(reg.ncols()) {
        reg[(i, i)] += epsilon;
    }
    reg
}

/// 2-norm condition number via singular values.
///
/// Fails soft: a degenerate decomposition (zero or non-finite smallest
/// singular value) reports +inf rather than erroring, which the caller
/// treats as "do not invert directly".
pub fn condition_number(matrix: &DMatrix<f64>) -> f64 {
    let singular_values = matrix.singular_values();

    let mut max_sv = 0.0_f64;
    let mut min_sv = f64::INFINITY;
    for sv in singular_values.iter() {
        if !sv.is_finite() {
            return f64::INFINITY;
        }
        max_sv = max_sv.max(*sv);
        min_sv = min_sv.min(*sv);
    }

    if min_sv <= 0.0 || !max_sv.is_finite() {
        return f64::INFINITY;
    }
    max_sv / min_sv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(n: usize) -> DMatrix<f64> {
        DMatrix::identity(n, n)
    }

    #[test]
    fn test_mahalanobis_zero_at_mean() {
        let mu = DVector::from_vec(vec![3.0, -1.0]);
        let d = mahalanobis(&mu, &mu, &identity(2));
        assert_eq!(d, 0.0);
    }

    #[test]
    fn test_mahalanobis_non_negative() {
        let mu = DVector::from_vec(vec![0.0, 0.0]);
        let x = DVector::from_vec(vec![3.0, 4.0]);
        let d = mahalanobis(&x, &mu, &identity(2));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_mahalanobis_clamps_negative_quadratic_form() {
        // A (non-PSD) inverse that drives the quadratic form negative.
        let cov_inv = DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, 0.0, -1.0]);
        let mu = DVector::from_vec(vec![0.0, 0.0]);
        let x = DVector::from_vec(vec![1.0, 1.0]);
        assert_eq!(mahalanobis(&x, &mu, &cov_inv), 0.0);
    }

    #[test]
    fn test_mahalanobis_invariant_under_rotation() {
        // D(Ax; A mu, (A cov A^T)^-1) == D(x; mu, cov^-1) for orthonormal A.
        let theta: f64 = 0.7;
        let rot = DMatrix::from_row_slice(
            2,
            2,
            &[theta.cos(), -theta.sin(), theta.sin(), theta.cos()],
        );
        let cov = DMatrix::from_row_slice(2, 2, &[2.0, 0.3, 0.3, 1.0]);
        let mu = DVector::from_vec(vec![1.0, 2.0]);
        let x = DVector::from_vec(vec![2.5, 0.5]);

        let cov_inv = cov.clone().try_inverse().unwrap();
        let d_orig = mahalanobis(&x, &mu, &cov_inv);

        let cov_rot = &rot * cov * rot.transpose();
        let cov_rot_inv = cov_rot.try_inverse().unwrap();
        let d_rot = mahalanobis(&(&rot * x), &(&rot * mu), &cov_rot_inv);

        assert!((d_orig - d_rot).abs() < 1e-9);
    }

    #[test]
    fn test_regularise_adds_to_diagonal_only() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 2.0]);
        let reg = regularise(&cov, 0.1);
        assert!((reg[(0, 0)] - 1.1).abs() < 1e-12);
        assert!((reg[(1, 1)] - 2.1).abs() < 1e-12);
        assert!((reg[(0, 1)] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_condition_number_identity() {
        assert!((condition_number(&identity(3)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_condition_number_singular_is_infinite() {
        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(condition_number(&singular).is_infinite());
    }
}
