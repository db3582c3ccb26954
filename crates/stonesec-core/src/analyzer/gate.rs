//! Severity aggregation and the fail-on threshold.

use super::report::{Finding, Severity};

/// Outcome of comparing a scan against a configured minimum severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Fail { worst: Severity, threshold: Severity },
}

impl GateDecision {
    pub fn is_failure(&self) -> bool {
        matches!(self, GateDecision::Fail { .. })
    }
}

/// First finding with the highest severity rank.
pub fn worst_finding(findings: &[Finding]) -> Option<&Finding> {
    findings.iter().fold(None, |worst: Option<&Finding>, f| match worst {
        Some(w) if w.severity() >= f.severity() => Some(w),
        _ => Some(f),
    })
}

pub fn worst_severity(findings: &[Finding]) -> Option<Severity> {
    worst_finding(findings).map(Finding::severity)
}

/// Fails iff some finding exists and the worst rank is at or above the
/// threshold. Without a threshold every scan passes.
pub fn evaluate(findings: &[Finding], threshold: Option<Severity>) -> GateDecision {
    match (worst_severity(findings), threshold) {
        (Some(worst), Some(threshold)) if worst >= threshold => {
            GateDecision::Fail { worst, threshold }
        }
        _ => GateDecision::Pass,
    }
}
