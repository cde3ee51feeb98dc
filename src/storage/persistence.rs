//! Model and scalar-state persistence.
//!
//! Three artefacts live under the base directory:
//! - `model_short.json.zst` / `model_long.json.zst`: zstd-compressed,
//!   field-named archives of {mu, cov, cov_inv} (nalgebra encodes the
//!   dimensions alongside the data, so a future d is recoverable without
//!   a schema).
//! - `state.json`: pretty-printed {threshold, risk}.
//!
//! Saves are atomic; loads treat anything missing or unreadable as "no
//! previous state" so a corrupted disk can only ever cost a retrain.

use std::path::{Path, PathBuf};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::ModelMatrices;

use super::atomic::atomic_write;

/// zstd level for model archives. Matrices at d <= 10 are small; favour
/// speed over ratio.
const ARCHIVE_COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk layout of a model archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub mu: DVector<f64>,
    pub cov: DMatrix<f64>,
    pub cov_inv: DMatrix<f64>,
}

impl From<&ModelMatrices> for ModelArtifact {
    fn from(m: &ModelMatrices) -> Self {
        Self {
            mu: m.mu.clone(),
            cov: m.cov.clone(),
            cov_inv: m.cov_inv.clone(),
        }
    }
}

impl From<ModelArtifact> for ModelMatrices {
    fn from(a: ModelArtifact) -> Self {
        Self {
            mu: a.mu,
            cov: a.cov,
            cov_inv: a.cov_inv,
        }
    }
}

/// Scalar state persisted alongside the model archives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarState {
    pub threshold: f64,
    pub risk: f64,
}

/// Owns the artefact paths and the encode/decode policy.
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    base_dir: PathBuf,
}

impl PersistenceManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn short_model_path(&self) -> PathBuf {
        self.base_dir.join("model_short.json.zst")
    }

    pub fn long_model_path(&self) -> PathBuf {
        self.base_dir.join("model_long.json.zst")
    }

    pub fn state_path(&self) -> PathBuf {
        self.base_dir.join("state.json")
    }

    /// Atomically save a model archive.
    pub fn save_model(
        &self,
        path: &Path,
        artifact: &ModelArtifact,
    ) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec(artifact)?;
        let compressed = zstd::encode_all(json.as_slice(), ARCHIVE_COMPRESSION_LEVEL)
            .map_err(|source| PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        atomic_write(path, &compressed).map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a model archive; `None` when missing or unreadable.
    pub fn load_model(&self, path: &Path) -> Option<ModelArtifact> {
        if !path.exists() {
            return None;
        }

        let compressed = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read model archive");
                return None;
            }
        };
        let json = match zstd::decode_all(compressed.as_slice()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "model archive is not valid zstd, ignoring");
                return None;
            }
        };
        match serde_json::from_slice(&json) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "model archive failed to decode, ignoring");
                None
            }
        }
    }

    /// Atomically save the scalar state (pretty-printed JSON).
    pub fn save_state(&self, state: &ScalarState) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(state)?;
        let path = self.state_path();
        atomic_write(&path, &json).map_err(|source| PersistenceError::Io { path, source })
    }

    /// Load the scalar state; `None` when missing or malformed.
    pub fn load_state(&self) -> Option<ScalarState> {
        let path = self.state_path();
        if !path.exists() {
            return None;
        }
        let raw = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read state file");
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file is malformed, ignoring");
                None
            }
        }
    }

    /// Load everything needed to resume monitoring. `None` unless both
    /// model archives and the scalar state decode cleanly.
    pub fn load_all(&self) -> Option<(ModelArtifact, ModelArtifact, ScalarState)> {
        let short = self.load_model(&self.short_model_path())?;
        let long = self.load_model(&self.long_model_path())?;
        let state = self.load_state()?;
        info!(base_dir = %self.base_dir.display(), "restored persisted models");
        Some((short, long, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> ModelArtifact {
        ModelArtifact {
            mu: DVector::from_vec(vec![50.0, 49.5]),
            cov: DMatrix::from_row_slice(2, 2, &[1.0, 0.25, 0.25, 2.0]),
            cov_inv: DMatrix::from_row_slice(2, 2, &[1.03, -0.13, -0.13, 0.52]),
        }
    }

    #[test]
    fn test_model_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PersistenceManager::new(dir.path());
        let original = artifact();

        let path = manager.long_model_path();
        manager.save_model(&path, &original).unwrap();
        let loaded = manager.load_model(&path).unwrap();

        // Bit-exact float64 equality, not approximate.
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_missing_model_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PersistenceManager::new(dir.path());
        assert!(manager.load_model(&manager.short_model_path()).is_none());
    }

    #[test]
    fn test_corrupt_model_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PersistenceManager::new(dir.path());
        let path = manager.short_model_path();
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(&path, b"definitely not zstd").unwrap();
        assert!(manager.load_model(&path).is_none());
    }

    #[test]
    fn test_state_round_trip_and_pretty_layout() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PersistenceManager::new(dir.path());
        let state = ScalarState {
            threshold: 2.75,
            risk: 4.5,
        };
        manager.save_state(&state).unwrap();

        assert_eq!(manager.load_state().unwrap(), state);

        let raw = std::fs::read_to_string(manager.state_path()).unwrap();
        assert!(raw.contains('\n'), "state.json should be human-readable");
        assert!(raw.contains("\"threshold\""));
    }

    #[test]
    fn test_malformed_state_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PersistenceManager::new(dir.path());
        std::fs::write(manager.state_path(), b"{not json").unwrap();
        assert!(manager.load_state().is_none());
    }

    #[test]
    fn test_load_all_requires_every_artefact() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PersistenceManager::new(dir.path());

        manager
            .save_model(&manager.short_model_path(), &artifact())
            .unwrap();
        manager
            .save_state(&ScalarState {
                threshold: 1.0,
                risk: 0.0,
            })
            .unwrap();
        // Long model missing.
        assert!(manager.load_all().is_none());

        manager
            .save_model(&manager.long_model_path(), &artifact())
            .unwrap();
        assert!(manager.load_all().is_some());
    }
}
