use crate::analyzer::report::{Finding, ScanReport, Severity};
use crate::rules::{self, RuleMeta};
use reqwest::Url;
use serde_json::json;
use std::path::Path;

/// Generate a SARIF 2.1.0 log from a scan report.
/// SARIF (Static Analysis Results Interchange Format) is consumed by
/// GitHub Code Scanning, VS Code, and other tools.
pub fn to_sarif(report: &ScanReport) -> serde_json::Value {
    let mut rule_ids: Vec<&str> = Vec::new();
    for finding in report.findings() {
        if !rule_ids.contains(&finding.rule_id()) {
            rule_ids.push(finding.rule_id());
        }
    }

    let descriptors: Vec<serde_json::Value> = rule_ids
        .iter()
        .map(|id| {
            let meta = rules::lookup(id).map(|kind| kind.meta());
            sarif_rule(id, meta, report.findings())
        })
        .collect();

    let results: Vec<serde_json::Value> = report
        .findings()
        .iter()
        .map(|f| sarif_result(f, &rule_ids))
        .collect();

    json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "stone-sec",
                    "version": env!("CARGO_PKG_VERSION"),
                    "rules": descriptors,
                }
            },
            "results": results,
            "invocations": [{
                "executionSuccessful": true,
                "toolExecutionNotifications": [],
            }]
        }]
    })
}

fn level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low => "note",
    }
}

fn sarif_rule(id: &str, meta: Option<&RuleMeta>, findings: &[Finding]) -> serde_json::Value {
    // Rules outside the registry still get a descriptor from their first finding.
    let (title, severity, family) = match meta {
        Some(meta) => (meta.title.to_string(), meta.severity, Some(meta.family.label())),
        None => {
            let first = findings.iter().find(|f| f.rule_id() == id);
            (
                first.map(|f| f.title().to_string()).unwrap_or_default(),
                first.map(Finding::severity).unwrap_or(Severity::Low),
                None,
            )
        }
    };

    json!({
        "id": id,
        "name": family.unwrap_or(id),
        "shortDescription": {
            "text": title,
        },
        "defaultConfiguration": {
            "level": level(severity),
        },
        "properties": {
            "severity": severity.as_str(),
        }
    })
}

/// `file://` URI for absolute paths; relative paths stay relative so a
/// consumer resolves them against its checkout.
fn artifact_uri(path: &Path) -> String {
    match Url::from_file_path(path) {
        Ok(url) => url.to_string(),
        Err(()) => path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    }
}

fn sarif_result(finding: &Finding, rule_ids: &[&str]) -> serde_json::Value {
    let mut message = format!("{}: {}", finding.title(), finding.snippet());
    if let Some(remediation) = finding.remediation() {
        message.push_str(&format!("\n\nRemediation: {remediation}"));
    }

    json!({
        "ruleId": finding.rule_id(),
        "ruleIndex": rule_ids.iter().position(|id| *id == finding.rule_id()),
        "level": level(finding.severity()),
        "message": {
            "text": message,
        },
        "locations": [{
            "physicalLocation": {
                "artifactLocation": {
                    "uri": artifact_uri(finding.file()),
                },
                "region": {
                    "startLine": finding.line(),
                    "snippet": {
                        "text": finding.snippet(),
                    }
                }
            }
        }],
    })
}
