//! Sentinel: adaptive streaming multivariate anomaly detection for host
//! telemetry.
//!
//! A low-dimensional feature vector is sampled at 1 Hz, smoothed, and
//! scored against two exponentially-weighted Gaussian baselines held
//! online. The system reports severity (normalised Mahalanobis distance),
//! accumulated risk (leaky nonlinear integrator), and drift (CUSUM on
//! severity), gates its own learning so anomalies cannot poison the
//! baseline, and freezes updates when covariance inversion turns
//! numerically unreliable.
//!
//! ## Architecture
//!
//! - **Data**: collector → feature builder → rolling-mean smoother
//! - **Statistical core**: dual-timescale Gaussian models with guarded
//!   inversion, contamination-gated online updates
//! - **Detection**: risk accumulator with alert hysteresis, CUSUM drift
//! - **Engine**: single-writer state machine (training ↔ monitoring)
//!   driven by a drift-corrected 1 Hz scheduler, publishing per-tick
//!   snapshots to observers
//! - **Storage**: atomic, crash-safe persistence of the latest model
//!   snapshot

pub mod config;
pub mod data;
pub mod detection;
pub mod engine;
pub mod model;
pub mod numerics;
pub mod storage;

// Re-export configuration
pub use config::SentinelConfig;

// Re-export the pipeline surface
pub use data::{DataSmoother, FeatureOrder, MetricsSource, SimulatedSource, SystemCollector};

// Re-export the statistical core
pub use model::{ModelMatrices, StatisticalModel};

// Re-export detection components
pub use detection::{DriftDetector, RiskAccumulator};

// Re-export engine components
pub use engine::{
    AlertStatus, EngineCommand, EngineSnapshot, SentinelEngine, TickScheduler,
};

// Re-export persistence
pub use storage::{ModelArtifact, PersistenceManager, ScalarState};
