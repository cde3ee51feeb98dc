//! Fixed-rate tick scheduler.
//!
//! One worker task drives the engine at the configured frequency with a
//! drift-corrected sleep: each interval is measured from the tick's own
//! start, so a slow tick shortens the following sleep instead of
//! compounding phase error. A tick that overruns the interval sleeps 0
//! and the loop keeps making forward progress.
//!
//! The tick body runs inside a catch-all; collector failures and panics
//! are logged and the worker survives for the lifetime of the process.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::defaults::SCHEDULER_STOP_TIMEOUT_SECS;

use super::{EngineCommand, SentinelEngine};

/// Owns the worker task driving a [`SentinelEngine`].
pub struct TickScheduler {
    interval: Duration,
    cancel: CancellationToken,
    pending: Option<(SentinelEngine, mpsc::Receiver<EngineCommand>)>,
    worker: Option<JoinHandle<()>>,
}

impl TickScheduler {
    /// Create a scheduler for the given engine at frequency `hz`.
    ///
    /// `hz` must already be validated positive by the config layer.
    pub fn new(
        engine: SentinelEngine,
        commands: mpsc::Receiver<EngineCommand>,
        hz: f64,
    ) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / hz),
            cancel: CancellationToken::new(),
            pending: Some((engine, commands)),
            worker: None,
        }
    }

    /// Spawn the worker. Idempotent: starting a running scheduler is a
    /// no-op.
    pub fn start(&mut self) {
        if self.worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return;
        }
        let Some((engine, commands)) = self.pending.take() else {
            warn!("scheduler already ran to completion, ignoring start");
            return;
        };

        info!(interval_ms = self.interval.as_millis() as u64, "scheduler starting");
        self.worker = Some(tokio::spawn(run_loop(
            engine,
            commands,
            self.interval,
            self.cancel.clone(),
        )));
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Signal the worker to stop and join it with a bounded wait.
    ///
    /// The worker notices cancellation at its interval sleep, so stop
    /// latency is bounded by one tick plus the join timeout.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        let Some(worker) = self.worker.take() else {
            return;
        };

        match tokio::time::timeout(
            Duration::from_secs(SCHEDULER_STOP_TIMEOUT_SECS),
            worker,
        )
        .await
        {
            Ok(Ok(())) => info!("scheduler stopped"),
            Ok(Err(e)) => error!(error = %e, "scheduler worker terminated abnormally"),
            Err(_) => warn!(
                timeout_secs = SCHEDULER_STOP_TIMEOUT_SECS,
                "scheduler worker did not stop within the bound, detaching"
            ),
        }
    }
}

/// The worker loop. Exits only on cancellation, then persists engine
/// state via [`SentinelEngine::shutdown`].
async fn run_loop(
    mut engine: SentinelEngine,
    mut commands: mpsc::Receiver<EngineCommand>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let started = Instant::now();

        // Apply control commands between ticks; the engine state machine
        // is only ever touched from this task.
        while let Ok(command) = commands.try_recv() {
            engine.apply(command);
        }

        match catch_unwind(AssertUnwindSafe(|| engine.tick())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("tick failed, retrying next interval: {e:#}"),
            Err(payload) => error!(
                panic = panic_message(payload.as_ref()),
                "tick panicked, worker continues"
            ),
        }

        let sleep = interval.saturating_sub(started.elapsed());
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(sleep) => {}
        }
    }

    engine.shutdown();
    info!("scheduler worker exited");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
