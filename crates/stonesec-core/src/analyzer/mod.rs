pub mod gate;
pub mod report;
pub mod sarif;

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::discovery;
use crate::error::ScanError;
use crate::rules;
use crate::syntax::{self, ParseError};
use report::{Finding, ScanReport};

/// Options for a directory or file scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Directory names skipped in addition to the built-in excludes.
    pub exclude: Vec<String>,
}

/// Run every registered rule over in-memory source.
pub fn scan_source(source: &str, path: &Path) -> Result<Vec<Finding>, ParseError> {
    let tree = syntax::parse_source(source, path)?;
    Ok(rules::run_rules(&tree, path))
}

/// Parse and scan one file.
pub fn scan_file(path: &Path) -> Result<Vec<Finding>, ParseError> {
    let tree = syntax::parse_file(path)?;
    let findings = rules::run_rules(&tree, path);
    debug!(file = %path.display(), findings = findings.len(), "scanned file");
    Ok(findings)
}

/// Scan an ordered file list in parallel.
///
/// Unreadable or unparsable files are skipped. The concatenated findings
/// are in input file order regardless of which worker finished first.
pub fn scan_files(files: &[PathBuf]) -> ScanReport {
    let per_file: Vec<Option<Vec<Finding>>> = files
        .par_iter()
        .map(|path| match scan_file(path) {
            Ok(findings) => Some(findings),
            Err(err) => {
                debug!(file = %path.display(), error = %err, "skipping file");
                None
            }
        })
        .collect();

    let files_scanned = per_file.iter().filter(|r| r.is_some()).count();
    let findings: Vec<Finding> = per_file.into_iter().flatten().flatten().collect();

    let mut report = ScanReport::new(findings);
    report.files_discovered = files.len();
    report.files_scanned = files_scanned;
    report.files_skipped = files.len() - files_scanned;
    report
}

/// Discover and scan everything under `target`.
pub fn scan_path(target: &Path, options: &ScanOptions) -> Result<ScanReport, ScanError> {
    let files = discovery::discover_python_files(target, &options.exclude)?;
    let report = scan_files(&files);

    info!(
        target = %target.display(),
        files = report.files_discovered,
        skipped = report.files_skipped,
        findings = report.total_findings(),
        worst = report.worst_severity().map(|s| s.as_str()).unwrap_or("none"),
        "scan complete"
    );
    Ok(report)
}
