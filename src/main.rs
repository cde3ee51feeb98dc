//! Sentinel - Adaptive Host Telemetry Anomaly Detection
//!
//! Samples host metrics at 1 Hz, learns a multivariate baseline, and
//! raises anomaly and drift signals against it.
//!
//! # Usage
//!
//! ```bash
//! # Monitor this host with defaults (~/.sentinel for state)
//! sentinel
//!
//! # Short training window against simulated metrics
//! sentinel --simulate --train-secs 60
//!
//! # Explicit config file
//! sentinel --config /etc/sentinel.toml
//! ```
//!
//! # Environment Variables
//!
//! - `SENTINEL_CONFIG`: Path to a TOML config file (CLI `--config` wins)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};

use sentinel::config::defaults::COMMAND_CHANNEL_CAPACITY;
use sentinel::{
    EngineCommand, EngineSnapshot, MetricsSource, SentinelConfig, SentinelEngine,
    SimulatedSource, SystemCollector, TickScheduler,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(about = "Adaptive streaming anomaly detection for host telemetry")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Override the base directory for persisted state
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Override the training window in seconds
    #[arg(long)]
    train_secs: Option<usize>,

    /// Override the tick frequency in Hz
    #[arg(long)]
    hz: Option<f64>,

    /// Use a simulated metrics source instead of live host metrics
    #[arg(long)]
    simulate: bool,

    /// Seed for the simulated source
    #[arg(long, default_value = "42")]
    seed: u64,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let mut config =
        SentinelConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(base_dir) = args.base_dir {
        config.base_dir = base_dir;
    }
    if let Some(train_secs) = args.train_secs {
        config.training_seconds = train_secs;
    }
    if let Some(hz) = args.hz {
        config.sample_rate_hz = hz;
    }
    config.validate().context("invalid configuration")?;

    info!(
        base_dir = %config.base_dir.display(),
        training_seconds = config.training_seconds,
        sample_rate_hz = config.sample_rate_hz,
        features = config.feature_dim(),
        "sentinel starting"
    );

    let collector: Box<dyn MetricsSource> = if args.simulate {
        info!(seed = args.seed, "using simulated metrics source");
        Box::new(SimulatedSource::new(args.seed))
    } else {
        Box::new(SystemCollector::new())
    };

    let hz = config.sample_rate_hz;
    let engine = SentinelEngine::new(config, collector).context("failed to build engine")?;
    let snapshots = engine.subscribe();

    // The command channel is the control boundary; retraining requests
    // from a future UI would flow through `command_tx`.
    let (_command_tx, command_rx) = mpsc::channel::<EngineCommand>(COMMAND_CHANNEL_CAPACITY);

    let mut scheduler = TickScheduler::new(engine, command_rx, hz);
    scheduler.start();

    let observer = tokio::spawn(observe_snapshots(snapshots));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    scheduler.stop().await;
    observer.abort();

    info!("sentinel terminated");
    Ok(())
}

// ============================================================================
// Console Observer
// ============================================================================

/// Minimal snapshot consumer standing in for the UI boundary.
///
/// Logs training progress periodically and every monitoring status
/// transition. A lagged receiver just resubscribes to the stream head;
/// the engine never waits for us.
async fn observe_snapshots(
    mut rx: tokio::sync::broadcast::Receiver<EngineSnapshot>,
) {
    use tokio::sync::broadcast::error::RecvError;

    let mut last_status = None;
    loop {
        match rx.recv().await {
            Ok(EngineSnapshot::Training {
                progress, target, ..
            }) => {
                if progress % 60 == 0 || progress == target {
                    info!(progress, target, "baseline training");
                }
            }
            Ok(EngineSnapshot::Monitoring {
                severity,
                risk,
                status,
                divergence,
                is_frozen,
                ..
            }) => {
                if last_status != Some(status) {
                    info!(%status, severity, risk, divergence, is_frozen, "status changed");
                    last_status = Some(status);
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "observer lagged, dropping oldest snapshots");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
