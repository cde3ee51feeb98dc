//! The single-writer monitoring engine.
//!
//! One worker owns every piece of mutable state; observers get value
//! snapshots over a broadcast channel and control arrives as commands on
//! an mpsc channel drained at the top of each tick. No locks anywhere.
//!
//! Per tick: collect → smooth → (train | score). The monitoring branch
//! scores severity against the long baseline, folds it into the risk pool
//! and the CUSUM statistic, snaps the short model onto the baseline on a
//! drift edge, and finally lets both models learn from the sample unless
//! the contamination gate vetoes it.

pub mod scheduler;
mod snapshot;

pub use scheduler::TickScheduler;
pub use snapshot::{AlertStatus, EngineSnapshot};

use std::collections::HashMap;

use anyhow::{Context, Result};
use nalgebra::DVector;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::defaults::{RISK_ELEVATED_THRESHOLD, SNAPSHOT_CHANNEL_CAPACITY};
use crate::config::SentinelConfig;
use crate::data::{DataSmoother, FeatureOrder, MetricsSource};
use crate::detection::{
    calculate_severity, is_contaminated, mean_divergence, DriftDetector, RiskAccumulator,
};
use crate::model::StatisticalModel;
use crate::storage::{ModelArtifact, PersistenceError, PersistenceManager, ScalarState};

// ============================================================================
// Commands
// ============================================================================

/// Control messages for the engine worker.
///
/// Senders never touch engine state directly; the worker applies pending
/// commands between ticks.
#[derive(Debug, Clone, Copy)]
pub enum EngineCommand {
    /// Discard the current baseline and relearn over `target_seconds`.
    Retrain { target_seconds: usize },
}

// ============================================================================
// Mode State Machine
// ============================================================================

/// Training accumulates vectors until the target, Monitoring scores them.
#[derive(Debug)]
enum EngineMode {
    Training {
        buffer: Vec<DVector<f64>>,
        target: usize,
    },
    Monitoring,
}

// ============================================================================
// Engine
// ============================================================================

/// Orchestrates the statistical core over a metrics source.
pub struct SentinelEngine {
    config: SentinelConfig,
    collector: Box<dyn MetricsSource>,
    smoother: DataSmoother,
    model_short: StatisticalModel,
    model_long: StatisticalModel,
    risk: RiskAccumulator,
    drift: DriftDetector,
    persistence: PersistenceManager,
    snapshot_tx: broadcast::Sender<EngineSnapshot>,
    mode: EngineMode,
}

impl SentinelEngine {
    /// Build the engine and attempt to resume from persisted state.
    ///
    /// A clean load of both model archives plus the scalar state skips
    /// training entirely; anything less starts a fresh training window.
    pub fn new(config: SentinelConfig, collector: Box<dyn MetricsSource>) -> Result<Self> {
        let order = FeatureOrder::new(config.feature_keys.clone())
            .context("invalid feature order")?;
        let smoother = DataSmoother::new(order, config.smoothing_window);

        let mut model_short = StatisticalModel::new(config.lambda_short, config.epsilon_base);
        let mut model_long = StatisticalModel::new(config.lambda_long, config.epsilon_base);
        let mut risk = RiskAccumulator::new(config.risk_alert_threshold);
        let drift = DriftDetector::new(config.cusum_k, config.cusum_threshold);
        let persistence = PersistenceManager::new(config.base_dir.clone());

        let mode = match persistence.load_all() {
            Some((short_artifact, long_artifact, state)) => {
                model_short.restore(short_artifact.into(), state.threshold);
                model_long.restore(long_artifact.into(), state.threshold);
                risk.restore(state.risk);
                info!(
                    threshold = state.threshold,
                    risk = state.risk,
                    "resuming monitoring from persisted models"
                );
                EngineMode::Monitoring
            }
            None => {
                info!(
                    target_seconds = config.training_seconds,
                    "no valid persisted state, entering training mode"
                );
                EngineMode::Training {
                    buffer: Vec::with_capacity(config.training_seconds),
                    target: config.training_seconds,
                }
            }
        };

        let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            collector,
            smoother,
            model_short,
            model_long,
            risk,
            drift,
            persistence,
            snapshot_tx,
            mode,
        })
    }

    /// Subscribe to per-tick snapshots. Slow consumers lag and lose the
    /// oldest snapshots; the worker is never backpressured.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn is_training(&self) -> bool {
        matches!(self.mode, EngineMode::Training { .. })
    }

    pub fn long_model(&self) -> &StatisticalModel {
        &self.model_long
    }

    pub fn short_model(&self) -> &StatisticalModel {
        &self.model_short
    }

    pub fn current_risk(&self) -> f64 {
        self.risk.risk()
    }

    /// Apply a pending control command.
    pub fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Retrain { target_seconds } => self.trigger_retraining(target_seconds),
        }
    }

    /// Execute one pipeline tick.
    ///
    /// Collector failures abort the tick before any state mutation, so
    /// risk and CUSUM carry unchanged into the retry on the next tick.
    pub fn tick(&mut self) -> Result<()> {
        let raw_metrics = self
            .collector
            .collect()
            .with_context(|| format!("collector '{}' failed", self.collector.source_name()))?;

        let Some(x_t) = self.smoother.process(&raw_metrics) else {
            // Smoothing window still warming up.
            return Ok(());
        };

        if self.is_training() {
            self.handle_training(x_t, raw_metrics)
        } else {
            self.handle_monitoring(&x_t, raw_metrics);
            Ok(())
        }
    }

    /// Accumulate a training sample; on reaching the target, initialise
    /// both models from the batch, persist, and switch to monitoring.
    fn handle_training(
        &mut self,
        x_t: DVector<f64>,
        raw_metrics: HashMap<String, f64>,
    ) -> Result<()> {
        let EngineMode::Training { buffer, target } = &mut self.mode else {
            return Ok(());
        };
        buffer.push(x_t);
        let progress = buffer.len();
        let target = *target;

        if progress >= target {
            info!(samples = progress, "training complete, initialising models");
            let batch = std::mem::take(buffer);

            self.model_short
                .init_from_batch(&batch)
                .context("short model initialisation failed")?;
            self.model_long
                .init_from_batch(&batch)
                .context("long model initialisation failed")?;

            // Persistence failure is logged here at the boundary; the
            // in-memory models are valid and shutdown will retry the save.
            if let Err(e) = self.save_all_state() {
                error!(error = %e, "failed to persist freshly trained models");
            }

            self.mode = EngineMode::Monitoring;
        }

        self.publish(EngineSnapshot::Training {
            progress,
            target,
            metrics: raw_metrics,
        });
        Ok(())
    }

    /// Score one smoothed sample and let the models learn from it.
    fn handle_monitoring(&mut self, x_t: &DVector<f64>, raw_metrics: HashMap<String, f64>) {
        let severity = match self.model_long.matrices() {
            Some(m) => calculate_severity(x_t, &m.mu, &m.cov_inv, self.model_long.threshold()),
            None => return,
        };

        let (risk_value, alert) = self.risk.update(severity);
        if alert {
            warn!(risk = risk_value, severity, "anomaly alert");
        }

        if self.drift.update(severity) {
            info!(severity, "distribution drift detected, snapping short model to baseline");
            self.model_short.snap_to(&self.model_long);
        }

        let divergence = match (self.model_short.matrices(), self.model_long.matrices()) {
            (Some(short), Some(long)) => mean_divergence(&short.mu, &long.mu),
            _ => 0.0,
        };

        if !is_contaminated(severity, self.config.contamination_limit) {
            self.model_short
                .update(x_t, severity, self.config.contamination_limit);
            self.model_long
                .update(x_t, severity, self.config.contamination_limit);
        }

        let status = if alert {
            AlertStatus::Anomaly
        } else if risk_value > RISK_ELEVATED_THRESHOLD {
            AlertStatus::Elevated
        } else {
            AlertStatus::Normal
        };

        self.publish(EngineSnapshot::Monitoring {
            metrics: raw_metrics,
            severity,
            risk: risk_value,
            status,
            divergence,
            is_frozen: self.model_long.is_frozen(),
        });
    }

    /// Discard the baseline and relearn. On-disk models stay in place
    /// until the next successful initialisation persists over them, so an
    /// aborted retrain falls back to the previous baseline on restart.
    pub fn trigger_retraining(&mut self, target_seconds: usize) {
        self.model_short.reset();
        self.model_long.reset();
        self.risk.reset();
        self.mode = EngineMode::Training {
            buffer: Vec::with_capacity(target_seconds),
            target: target_seconds,
        };
        info!(target_seconds, "retraining triggered");
    }

    /// Persist final state. Called by the scheduler when the worker exits;
    /// a no-op during training (there is nothing worth saving yet).
    pub fn shutdown(&mut self) {
        if self.is_training() {
            info!("shutting down during training, nothing persisted");
            return;
        }
        match self.save_all_state() {
            Ok(()) => info!("shutdown complete, state saved"),
            Err(e) => error!(error = %e, "failed to persist state on shutdown"),
        }
    }

    fn save_all_state(&self) -> Result<(), PersistenceError> {
        let (Some(short), Some(long)) =
            (self.model_short.matrices(), self.model_long.matrices())
        else {
            return Ok(());
        };

        self.persistence
            .save_model(&self.persistence.short_model_path(), &ModelArtifact::from(short))?;
        self.persistence
            .save_model(&self.persistence.long_model_path(), &ModelArtifact::from(long))?;
        self.persistence.save_state(&ScalarState {
            threshold: self.model_long.threshold(),
            risk: self.risk.risk(),
        })
    }

    fn publish(&self, snapshot: EngineSnapshot) {
        // Err means no observers are subscribed, which is fine.
        let _ = self.snapshot_tx.send(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CollectorError;

    /// Replays a fixed sequence of metric maps, then errors.
    struct ScriptedSource {
        frames: std::vec::IntoIter<HashMap<String, f64>>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<HashMap<String, f64>>) -> Self {
            Self {
                frames: frames.into_iter(),
            }
        }
    }

    impl MetricsSource for ScriptedSource {
        fn collect(&mut self) -> Result<HashMap<String, f64>, CollectorError> {
            self.frames.next().ok_or(CollectorError::Exhausted)
        }

        fn source_name(&self) -> &str {
            "scripted"
        }
    }

    fn metrics(cpu: f64, ram: f64) -> HashMap<String, f64> {
        let mut m = HashMap::new();
        m.insert("cpu_percent".to_string(), cpu);
        m.insert("ram_percent".to_string(), ram);
        m
    }

    fn test_config(base_dir: &std::path::Path) -> SentinelConfig {
        SentinelConfig {
            base_dir: base_dir.to_path_buf(),
            training_seconds: 10,
            smoothing_window: 1,
            feature_keys: vec!["cpu_percent".to_string(), "ram_percent".to_string()],
            ..SentinelConfig::default()
        }
    }

    #[test]
    fn test_cold_start_trains_then_monitors() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<_> = (0..12).map(|_| metrics(50.0, 50.0)).collect();
        let mut engine = SentinelEngine::new(
            test_config(dir.path()),
            Box::new(ScriptedSource::new(frames)),
        )
        .unwrap();
        let mut rx = engine.subscribe();

        assert!(engine.is_training());
        for _ in 0..10 {
            engine.tick().unwrap();
        }
        assert!(!engine.is_training());

        let long = engine.long_model();
        assert!(long.is_initialized());
        let mu = &long.matrices().unwrap().mu;
        assert!((mu[0] - 50.0).abs() < 1e-9);
        assert!((mu[1] - 50.0).abs() < 1e-9);

        // Constant stream: the first monitoring tick scores severity 0.
        engine.tick().unwrap();
        let mut last = None;
        while let Ok(snapshot) = rx.try_recv() {
            last = Some(snapshot);
        }
        match last.unwrap() {
            EngineSnapshot::Monitoring {
                severity,
                risk,
                status,
                ..
            } => {
                assert_eq!(severity, 0.0);
                assert_eq!(risk, 0.0);
                assert_eq!(status, AlertStatus::Normal);
            }
            EngineSnapshot::Training { .. } => panic!("expected monitoring snapshot"),
        }
    }

    #[test]
    fn test_training_snapshots_report_progress() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<_> = (0..3).map(|_| metrics(10.0, 20.0)).collect();
        let mut engine = SentinelEngine::new(
            test_config(dir.path()),
            Box::new(ScriptedSource::new(frames)),
        )
        .unwrap();
        let mut rx = engine.subscribe();

        engine.tick().unwrap();
        engine.tick().unwrap();

        match rx.try_recv().unwrap() {
            EngineSnapshot::Training {
                progress, target, ..
            } => {
                assert_eq!(progress, 1);
                assert_eq!(target, 10);
            }
            EngineSnapshot::Monitoring { .. } => panic!("expected training snapshot"),
        }
    }

    #[test]
    fn test_collector_failure_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = SentinelEngine::new(
            test_config(dir.path()),
            Box::new(ScriptedSource::new(vec![metrics(1.0, 1.0)])),
        )
        .unwrap();

        engine.tick().unwrap();
        assert!(engine.tick().is_err());
        // Still training with one buffered sample, risk untouched.
        assert!(engine.is_training());
        assert_eq!(engine.current_risk(), 0.0);
    }

    #[test]
    fn test_retrain_command_resets_models_and_risk() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<_> = (0..20)
            .map(|i| metrics(50.0 + f64::from(i % 5), 50.0 - f64::from(i % 3)))
            .collect();
        let mut engine = SentinelEngine::new(
            test_config(dir.path()),
            Box::new(ScriptedSource::new(frames)),
        )
        .unwrap();

        for _ in 0..10 {
            engine.tick().unwrap();
        }
        assert!(!engine.is_training());

        engine.apply(EngineCommand::Retrain { target_seconds: 5 });
        assert!(engine.is_training());
        assert!(!engine.long_model().is_initialized());
        assert_eq!(engine.current_risk(), 0.0);

        // Previous artefacts remain on disk until the next init persists.
        assert!(dir.path().join("model_long.json.zst").exists());
    }

    #[test]
    fn test_restart_resumes_monitoring() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<_> = (0..10)
            .map(|i| metrics(40.0 + f64::from(i), 60.0 - f64::from(i)))
            .collect();
        let mut engine = SentinelEngine::new(
            test_config(dir.path()),
            Box::new(ScriptedSource::new(frames)),
        )
        .unwrap();
        for _ in 0..10 {
            engine.tick().unwrap();
        }
        let threshold = engine.long_model().threshold();
        engine.shutdown();
        drop(engine);

        let restarted = SentinelEngine::new(
            test_config(dir.path()),
            Box::new(ScriptedSource::new(vec![])),
        )
        .unwrap();
        assert!(!restarted.is_training());
        assert!((restarted.long_model().threshold() - threshold).abs() < 1e-15);
    }
}
