//! Guarded covariance inversion.
//!
//! The online covariance of a low-variance host can collapse toward
//! singularity (idle machines produce near-constant features). Inverting
//! such a matrix poisons every downstream severity, so inversion goes
//! through an escalating-regularisation ladder and, when that fails,
//! falls back to a pseudo-inverse while flagging the model frozen.

use nalgebra::DMatrix;
use tracing::warn;

use crate::config::defaults::{INVERSION_RETRIES, MAX_CONDITION_NUMBER};

use super::{condition_number, regularise};

/// Outcome of [`safe_invert`].
#[derive(Debug, Clone)]
pub struct Inversion {
    /// Inverse (or pseudo-inverse) of the regularised covariance.
    pub inverse: DMatrix<f64>,
    /// True when only a pseudo-inverse could be produced. The caller must
    /// treat this as the authoritative "updates are unsafe" signal; the
    /// pseudo-inverse remains usable for scoring.
    pub frozen: bool,
    /// Regularisation epsilon that produced `inverse`.
    pub epsilon: f64,
}

/// Attempt to invert a covariance matrix safely.
///
/// Starting at `base_epsilon`, regularise the matrix, and accept a direct
/// inverse only while the condition number stays under the configured
/// ceiling; otherwise escalate epsilon by 10x, up to 5 attempts. When all
/// attempts fail the result is the pseudo-inverse of the base-regularised
/// matrix with `frozen = true`.
pub fn safe_invert(cov: &DMatrix<f64>, base_epsilon: f64) -> Inversion {
    let mut epsilon = base_epsilon;

    for _ in 0..INVERSION_RETRIES {
        let reg = regularise(cov, epsilon);
        if condition_number(&reg) < MAX_CONDITION_NUMBER {
            if let Some(inverse) = reg.try_inverse() {
                return Inversion {
                    inverse,
                    frozen: false,
                    epsilon,
                };
            }
        }
        epsilon *= 10.0;
    }

    warn!(
        base_epsilon,
        final_epsilon = epsilon,
        "covariance still ill-conditioned after escalating regularisation, \
         falling back to pseudo-inverse and freezing updates"
    );

    let reg = regularise(cov, base_epsilon);
    let n = reg.nrows();
    let inverse = reg
        .pseudo_inverse(f64::EPSILON)
        .unwrap_or_else(|_| DMatrix::zeros(n, n));

    Inversion {
        inverse,
        frozen: true,
        epsilon: base_epsilon,
    }
}
