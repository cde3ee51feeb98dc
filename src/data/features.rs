//! Feature vector construction.
//!
//! The feature order is declared once at startup and never changes for the
//! process lifetime; every downstream matrix dimension hangs off it.

use std::collections::HashMap;

use nalgebra::DVector;
use thiserror::Error;

use crate::config::defaults::MAX_FEATURE_DIM;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("feature order is empty")]
    Empty,

    #[error("feature dimension {0} exceeds maximum of {1}")]
    DimensionOverflow(usize, usize),
}

/// Immutable, ordered list of metric keys defining the feature vector x_t.
#[derive(Debug, Clone)]
pub struct FeatureOrder {
    keys: Vec<String>,
}

impl FeatureOrder {
    /// Declare the feature order. Dimension violations are startup-fatal:
    /// the order is fixed afterwards, so this can never fail at runtime.
    pub fn new(keys: Vec<String>) -> Result<Self, FeatureError> {
        if keys.is_empty() {
            return Err(FeatureError::Empty);
        }
        if keys.len() > MAX_FEATURE_DIM {
            return Err(FeatureError::DimensionOverflow(keys.len(), MAX_FEATURE_DIM));
        }
        Ok(Self { keys })
    }

    /// Feature dimension d.
    pub fn dim(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Build x_t from a raw metrics map. Missing metrics default to 0.0.
    pub fn build_vector(&self, metrics: &HashMap<String, f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.keys.len(),
            self.keys
                .iter()
                .map(|key| metrics.get(key).copied().unwrap_or(0.0)),
        )
    }
}
