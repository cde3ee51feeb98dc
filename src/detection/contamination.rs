//! Contamination gate.

/// True when the sample is too anomalous to be absorbed into the baseline.
///
/// Applied by the engine before any model update and again inside
/// `StatisticalModel::update` as defence in depth.
pub fn is_contaminated(severity: f64, severity_limit: f64) -> bool {
    severity >= severity_limit
}
