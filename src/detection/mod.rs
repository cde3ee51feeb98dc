//! Anomaly and drift detection on the severity stream.
//!
//! Severity itself is scored against the long-horizon baseline; these
//! components turn the per-tick scalar into operational signals: a gated
//! learning decision, an accumulated risk with an alert edge, and a CUSUM
//! drift edge.

mod contamination;
mod drift;
mod risk;

pub use contamination::is_contaminated;
pub use drift::{mean_divergence, DriftDetector};
pub use risk::{calculate_severity, RiskAccumulator};
