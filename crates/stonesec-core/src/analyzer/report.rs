use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use super::gate::{self, GateDecision};

/// Severity level for findings. Variants are declared in rank order, so the
/// derived ordering is the ordinal comparison used for gating.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn symbol(&self) -> &str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid severity level: {0} (expected low, medium, high or critical)")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(ParseSeverityError(value.to_string())),
        }
    }
}

/// Optional natural-language fields attached after detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub explanation: Option<String>,
    pub exploit_scenario: Option<String>,
    pub remediation: Option<String>,
}

/// One detected occurrence of a rule.
///
/// Detection fields are private and set only by [`Finding::new`]. The
/// enrichment slot can be filled once through [`Finding::enriched`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    file: PathBuf,
    line: usize,
    rule_id: String,
    severity: Severity,
    title: String,
    snippet: String,
    enrichment: Option<Enrichment>,
}

impl Finding {
    pub fn new(
        file: impl Into<PathBuf>,
        line: usize,
        rule_id: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            rule_id: rule_id.into(),
            severity,
            title: title.into(),
            snippet: snippet.into(),
            enrichment: None,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn snippet(&self) -> &str {
        &self.snippet
    }

    pub fn enrichment(&self) -> Option<&Enrichment> {
        self.enrichment.as_ref()
    }

    pub fn explanation(&self) -> Option<&str> {
        self.enrichment.as_ref()?.explanation.as_deref()
    }

    pub fn exploit_scenario(&self) -> Option<&str> {
        self.enrichment.as_ref()?.exploit_scenario.as_deref()
    }

    pub fn remediation(&self) -> Option<&str> {
        self.enrichment.as_ref()?.remediation.as_deref()
    }

    /// Copy of this finding carrying `enrichment`. A finding that was
    /// already enriched is returned unchanged.
    pub fn enriched(mut self, enrichment: Enrichment) -> Self {
        if self.enrichment.is_none() {
            self.enrichment = Some(enrichment);
        }
        self
    }
}

#[derive(Serialize)]
struct FindingRecord<'a> {
    rule_id: &'a str,
    severity: Severity,
    title: &'a str,
    file: String,
    line: usize,
    snippet: &'a str,
    explanation: Option<&'a str>,
    exploit_scenario: Option<&'a str>,
    remediation: Option<&'a str>,
}

impl Serialize for Finding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        FindingRecord {
            rule_id: &self.rule_id,
            severity: self.severity,
            title: &self.title,
            file: self.file.display().to_string(),
            line: self.line,
            snippet: &self.snippet,
            explanation: self.explanation(),
            exploit_scenario: self.exploit_scenario(),
            remediation: self.remediation(),
        }
        .serialize(serializer)
    }
}

/// Result of scanning a file set: the ordered findings plus file counters.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub files_discovered: usize,
    pub files_scanned: usize,
    pub files_skipped: usize,
    findings: Vec<Finding>,
}

impl ScanReport {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            ..Self::default()
        }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn total_findings(&self) -> usize {
        self.findings.len()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity() == severity)
            .count()
    }

    pub fn worst_finding(&self) -> Option<&Finding> {
        gate::worst_finding(&self.findings)
    }

    pub fn worst_severity(&self) -> Option<Severity> {
        gate::worst_severity(&self.findings)
    }

    pub fn gate(&self, threshold: Option<Severity>) -> GateDecision {
        gate::evaluate(&self.findings, threshold)
    }

    /// Attach enrichments positionally. Extra entries on either side are
    /// ignored; detection fields are never touched.
    pub fn apply_enrichments(&mut self, enrichments: Vec<Enrichment>) {
        let findings = std::mem::take(&mut self.findings);
        let mut enrichments = enrichments.into_iter();
        self.findings = findings
            .into_iter()
            .map(|f| match enrichments.next() {
                Some(e) => f.enriched(e),
                None => f,
            })
            .collect();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&JsonReport {
            total_findings: self.findings.len(),
            findings: &self.findings,
        })
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    total_findings: usize,
    findings: &'a [Finding],
}
