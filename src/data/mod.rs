//! Data acquisition and conditioning.
//!
//! Collector → feature builder → smoother, in that order. Everything past
//! the collector is deterministic; the collector is the only boundary to
//! the outside world.

mod collector;
mod features;
mod smoothing;

pub use collector::{CollectorError, MetricsSource, SimulatedSource, SystemCollector};
pub use features::{FeatureError, FeatureOrder};
pub use smoothing::{DataSmoother, RollingWindow};
