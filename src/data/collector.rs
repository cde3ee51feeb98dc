//! Metrics sources.
//!
//! The engine pulls one raw metrics map per tick through [`MetricsSource`].
//! Production uses the sysinfo-backed [`SystemCollector`]; `--simulate`
//! swaps in a seeded Gaussian [`SimulatedSource`] so the full pipeline can
//! run without host privileges.

use std::collections::HashMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use sysinfo::{Components, Networks, ProcessRefreshKind, System};
use thiserror::Error;
use tracing::debug;

use crate::config::defaults::DEFAULT_FEATURE_KEYS;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("metrics source exhausted")]
    Exhausted,

    #[error("metrics source unavailable: {0}")]
    Unavailable(String),
}

/// Where raw metrics come from.
///
/// Implementations are called once per tick from the engine's worker and
/// must be cheap relative to the tick interval. An `Err` aborts the tick;
/// the scheduler logs it and the next tick retries.
pub trait MetricsSource: Send {
    /// Sample the source and return a metric-name → value map.
    fn collect(&mut self) -> Result<HashMap<String, f64>, CollectorError>;

    /// Human-readable name for logging (e.g. "system", "simulated").
    fn source_name(&self) -> &str;
}

// ============================================================================
// System Collector
// ============================================================================

/// Live host metrics via sysinfo.
///
/// Rate metrics (disk and network bytes/s) are deltas of monotonic
/// counters over the tick interval; construction primes the counters and
/// the CPU sampler so the first tick already produces sane values.
pub struct SystemCollector {
    system: System,
    networks: Networks,
    components: Components,
    last_sample: Instant,
    last_net_received: u64,
    last_net_transmitted: u64,
}

impl SystemCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        // Prime CPU usage (needs two refreshes to produce a delta) and the
        // per-process IO counters so the first collect() sees deltas.
        system.refresh_cpu_usage();
        system.refresh_memory();
        system.refresh_processes_specifics(ProcessRefreshKind::new().with_disk_usage());

        let networks = Networks::new_with_refreshed_list();
        let components = Components::new_with_refreshed_list();

        let (received, transmitted) = Self::network_totals(&networks);

        Self {
            system,
            networks,
            components,
            last_sample: Instant::now(),
            last_net_received: received,
            last_net_transmitted: transmitted,
        }
    }

    fn network_totals(networks: &Networks) -> (u64, u64) {
        let mut received = 0u64;
        let mut transmitted = 0u64;
        for (_name, data) in networks {
            received += data.total_received();
            transmitted += data.total_transmitted();
        }
        (received, transmitted)
    }

    /// Best-effort CPU temperature: first CPU-ish thermal component, then
    /// any component, then 0.0 when the host exposes no sensors.
    fn cpu_temperature(&self) -> f64 {
        let mut fallback = None;
        for component in &self.components {
            let label = component.label().to_ascii_lowercase();
            if label.contains("cpu") || label.contains("core") || label.contains("tdie") {
                return f64::from(component.temperature());
            }
            if fallback.is_none() {
                fallback = Some(f64::from(component.temperature()));
            }
        }
        fallback.unwrap_or(0.0)
    }
}

impl Default for SystemCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SystemCollector {
    fn collect(&mut self) -> Result<HashMap<String, f64>, CollectorError> {
        let now = Instant::now();
        let mut dt = now.duration_since(self.last_sample).as_secs_f64();
        if dt <= 0.0 {
            dt = 1.0;
        }

        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        self.system
            .refresh_processes_specifics(ProcessRefreshKind::new().with_disk_usage());
        self.networks.refresh();
        self.components.refresh();

        let cpu_percent = f64::from(self.system.global_cpu_info().cpu_usage());

        let total_memory = self.system.total_memory();
        let ram_percent = if total_memory == 0 {
            0.0
        } else {
            self.system.used_memory() as f64 / total_memory as f64 * 100.0
        };

        // Per-process IO counters are deltas since the previous refresh.
        let mut disk_read = 0u64;
        let mut disk_written = 0u64;
        for process in self.system.processes().values() {
            let usage = process.disk_usage();
            disk_read += usage.read_bytes;
            disk_written += usage.written_bytes;
        }

        let (net_received, net_transmitted) = Self::network_totals(&self.networks);
        let net_recv_rate =
            net_received.saturating_sub(self.last_net_received) as f64 / dt;
        let net_sent_rate =
            net_transmitted.saturating_sub(self.last_net_transmitted) as f64 / dt;

        let mut metrics = HashMap::with_capacity(DEFAULT_FEATURE_KEYS.len());
        metrics.insert("cpu_percent".to_string(), cpu_percent);
        metrics.insert("ram_percent".to_string(), ram_percent);
        metrics.insert("disk_read_rate".to_string(), disk_read as f64 / dt);
        metrics.insert("disk_write_rate".to_string(), disk_written as f64 / dt);
        metrics.insert("net_bytes_sent_rate".to_string(), net_sent_rate);
        metrics.insert("net_bytes_recv_rate".to_string(), net_recv_rate);
        metrics.insert("cpu_temperature".to_string(), self.cpu_temperature());

        self.last_sample = now;
        self.last_net_received = net_received;
        self.last_net_transmitted = net_transmitted;

        debug!(dt, cpu_percent, ram_percent, "host metrics sampled");
        Ok(metrics)
    }

    fn source_name(&self) -> &str {
        "system"
    }
}

// ============================================================================
// Simulated Source
// ============================================================================

/// Seeded Gaussian metrics generator for demos and soak testing.
///
/// Each canonical metric draws from its own normal distribution; values
/// that model percentages are clamped to [0, 100].
pub struct SimulatedSource {
    rng: StdRng,
    profiles: Vec<(String, Normal<f64>, bool)>,
}

impl SimulatedSource {
    pub fn new(seed: u64) -> Self {
        let profile = |key: &str, mean: f64, std: f64, clamp: bool| {
            // Std deviations here are all positive constants, so the
            // distribution constructor cannot fail.
            Normal::new(mean, std)
                .map(|n| (key.to_string(), n, clamp))
                .ok()
        };

        let profiles = [
            profile("cpu_percent", 35.0, 8.0, true),
            profile("ram_percent", 55.0, 4.0, true),
            profile("disk_read_rate", 2.0e6, 6.0e5, false),
            profile("disk_write_rate", 1.0e6, 4.0e5, false),
            profile("net_bytes_sent_rate", 4.0e5, 1.5e5, false),
            profile("net_bytes_recv_rate", 8.0e5, 3.0e5, false),
            profile("cpu_temperature", 52.0, 3.0, false),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self {
            rng: StdRng::seed_from_u64(seed),
            profiles,
        }
    }
}

impl MetricsSource for SimulatedSource {
    fn collect(&mut self) -> Result<HashMap<String, f64>, CollectorError> {
        let mut metrics = HashMap::with_capacity(self.profiles.len());
        for (key, dist, clamp) in &self.profiles {
            let mut value = dist.sample(&mut self.rng).max(0.0);
            if *clamp {
                value = value.min(100.0);
            }
            metrics.insert(key.clone(), value);
        }
        Ok(metrics)
    }

    fn source_name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_source_covers_canonical_keys() {
        let mut source = SimulatedSource::new(7);
        let metrics = source.collect().unwrap();
        for key in DEFAULT_FEATURE_KEYS {
            assert!(metrics.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_simulated_source_is_deterministic_per_seed() {
        let mut a = SimulatedSource::new(42);
        let mut b = SimulatedSource::new(42);
        assert_eq!(a.collect().unwrap(), b.collect().unwrap());
    }

    #[test]
    fn test_simulated_percentages_clamped() {
        let mut source = SimulatedSource::new(1);
        for _ in 0..500 {
            let metrics = source.collect().unwrap();
            let cpu = metrics["cpu_percent"];
            assert!((0.0..=100.0).contains(&cpu));
        }
    }
}
