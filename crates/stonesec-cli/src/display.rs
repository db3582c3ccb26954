use colored::*;
use stonesec_core::rules::REGISTRY;
use stonesec_core::{Finding, ScanReport, Severity};
use std::path::Path;

/// Print a full scan report to the terminal.
pub fn print_scan_report(report: &ScanReport, target: &Path) {
    println!();
    println!(
        "{}",
        format!(
            " stone-sec v{} - Reviewing {}",
            env!("CARGO_PKG_VERSION"),
            target.display()
        )
        .bold()
    );
    println!(
        " {} {} Python files, {} skipped",
        "|-".dimmed(),
        report.files_discovered,
        report.files_skipped
    );
    println!();

    if report.files_discovered == 0 {
        println!(" {}", "No Python files found.".yellow());
        println!();
        return;
    }

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    if report.is_empty() {
        println!(" {} No security issues found.", "OK".green().bold());
        println!();
        return;
    }

    for finding in report.findings() {
        print_finding(finding);
        println!();
    }

    println!(" {}", "=".repeat(60).dimmed());
    println!();
    println!(" {}", "Summary".bold().underline());
    println!(
        " {} Findings: {} total ({})",
        "|-".dimmed(),
        report.total_findings(),
        severity_breakdown(report)
    );
    if let Some(worst) = report.worst_severity() {
        println!(" {} Highest severity: {}", "|-".dimmed(), severity_tag(worst));
    }
    println!();
}

fn severity_tag(severity: Severity) -> String {
    let label = format!(" {} ", severity.symbol());
    match severity {
        Severity::Critical => label.on_red().white().bold().to_string(),
        Severity::High => label.on_yellow().black().bold().to_string(),
        Severity::Medium => label.on_blue().white().bold().to_string(),
        Severity::Low => label.dimmed().to_string(),
    }
}

/// Comma-separated counts, most severe first, zero counts omitted.
pub fn severity_breakdown(report: &ScanReport) -> String {
    let parts: Vec<String> = Severity::ALL
        .iter()
        .rev()
        .filter_map(|&severity| {
            let count = report.count(severity);
            (count > 0).then(|| format!("{} {}", count, severity.as_str()))
        })
        .collect();
    parts.join(", ")
}

fn print_finding(finding: &Finding) {
    println!(
        " {} {}",
        severity_tag(finding.severity()),
        finding.title().bold()
    );
    println!("   {} Rule: {}", "|".dimmed(), finding.rule_id().cyan());
    println!(
        "   {} File: {}:{}",
        "|".dimmed(),
        finding.file().display(),
        finding.line()
    );
    println!("   {} Code: {}", "|".dimmed(), finding.snippet().dimmed());

    if let Some(explanation) = finding.explanation() {
        println!("   {} Explanation: {}", "|".dimmed(), explanation);
    }
    if let Some(scenario) = finding.exploit_scenario() {
        println!("   {} Exploit scenario: {}", "|".dimmed(), scenario);
    }
    if let Some(remediation) = finding.remediation() {
        println!("   {} Fix: {}", "|".dimmed(), remediation.green());
    }
}

/// Print the rule catalog in registry order.
pub fn print_rules() {
    println!();
    println!(" {}", "Registered rules".bold().underline());
    println!();
    for kind in REGISTRY {
        let meta = kind.meta();
        println!(
            " {} {:<10} {}",
            format!("{:<24}", meta.id).cyan(),
            meta.severity.symbol(),
            meta.title
        );
    }
    println!();
}
