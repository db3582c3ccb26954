use std::fs;
use std::path::{Path, PathBuf};
use stonesec_core::analyzer::{self, sarif, ScanOptions};
use stonesec_core::explainer::{self, Explainer, ExplainerConfig, Provider};
use stonesec_core::rules::REGISTRY;
use stonesec_core::{scan_path, scan_source, GateDecision, ScanError, ScanReport, Severity};

/// Get the workspace root (two levels up from CARGO_MANIFEST_DIR of stonesec-core).
fn fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .parent()
        .unwrap() // crates/
        .parent()
        .unwrap() // workspace root
        .join("tests/fixtures")
}

fn fixture(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

fn scan(path: &Path) -> ScanReport {
    scan_path(path, &ScanOptions::default()).unwrap()
}

// ─── Detection scenarios ───

#[test]
fn test_eval_literal_is_one_high_finding() {
    let findings = scan_source("eval(\"2+2\")\n", Path::new("calc.py")).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rule_id(), "PY-EVAL-001");
    assert_eq!(findings[0].severity(), Severity::High);
}

#[test]
fn test_yaml_load_default_deny_and_safe_loader() {
    let flagged = scan_source("import yaml\nyaml.load(doc)\n", Path::new("y.py")).unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].rule_id(), "PY-YAML-001");

    let safe = scan_source(
        "import yaml\nyaml.load(doc, yaml.SafeLoader)\n",
        Path::new("y.py"),
    )
    .unwrap();
    assert!(safe.is_empty());
}

#[test]
fn test_two_weak_digests_and_one_strong() {
    let source = "import hashlib\nhashlib.md5(a)\nhashlib.sha256(b)\nhashlib.sha1(c)\n";
    let findings = scan_source(source, Path::new("h.py")).unwrap();
    assert_eq!(findings.len(), 2);
    assert!(findings.iter().all(|f| f.severity() == Severity::Medium));
}

#[test]
fn test_unparsable_file_is_skipped_without_error() {
    let report = scan(&fixture("mixed"));
    assert_eq!(report.files_discovered, 2);
    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.files_skipped, 1);
    assert!(report.is_empty());
    assert_eq!(report.gate(Some(Severity::Low)), GateDecision::Pass);
}

#[test]
fn test_threshold_scenarios() {
    let report = ScanReport::new(
        scan_source("import tempfile\ntempfile.mktemp()\n", Path::new("t.py")).unwrap(),
    );
    assert_eq!(report.worst_severity(), Some(Severity::Medium));
    assert_eq!(report.gate(Some(Severity::High)), GateDecision::Pass);
    assert!(report.gate(Some(Severity::Medium)).is_failure());

    let empty = ScanReport::default();
    assert_eq!(empty.gate(Some(Severity::Critical)), GateDecision::Pass);
}

#[test]
fn test_literal_only_keyword_through_module_alias() {
    let flagged = scan_source(
        "import subprocess as sp\nsp.call(cmd, shell=True)\n",
        Path::new("s.py"),
    )
    .unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].rule_id(), "PY-SUBPROCESS-001");

    let variable = scan_source(
        "import subprocess as sp\nflag = True\nsp.call(cmd, shell=flag)\n",
        Path::new("s.py"),
    )
    .unwrap();
    assert!(variable.is_empty());
}

#[test]
fn test_too_deep_file_does_not_abort_the_scan() {
    let tmp = tempfile::tempdir().unwrap();
    let terms = vec!["1"; 10_000].join(" + ");
    fs::write(tmp.path().join("generated.py"), format!("x = {terms}\n")).unwrap();
    fs::write(tmp.path().join("other.py"), "eval(y)\n").unwrap();

    let report = scan(tmp.path());
    assert_eq!(report.files_discovered, 2);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.total_findings(), 1);
    assert_eq!(report.findings()[0].rule_id(), "PY-EVAL-001");
    assert!(report.gate(Some(Severity::High)).is_failure());
}

#[test]
fn test_unpacked_loader_is_not_trusted() {
    let source = "import yaml\nL = yaml.SafeLoader\nL, M = yaml.Loader, 1\nyaml.load(d, Loader=L)\n";
    let findings = scan_source(source, Path::new("y.py")).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rule_id(), "PY-YAML-001");
    assert_eq!(findings[0].line(), 4);
}

// ─── Fixture coverage ───

#[test]
fn test_vulnerable_fixture_triggers_every_rule() {
    let report = scan(&fixture("vulnerable/all_rules_sample.py"));
    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.total_findings(), 23);

    for kind in REGISTRY {
        let id = kind.meta().id;
        assert!(
            report.findings().iter().any(|f| f.rule_id() == id),
            "no finding for {id}"
        );
    }

    assert_eq!(report.count(Severity::Medium), 5);
    assert_eq!(report.count(Severity::High), 18);
    assert_eq!(report.worst_finding().map(|f| f.rule_id()), Some("PY-EVAL-001"));
    assert!(report.gate(Some(Severity::High)).is_failure());
    assert_eq!(report.gate(Some(Severity::Critical)), GateDecision::Pass);
}

#[test]
fn test_vulnerable_fixture_order_and_lines() {
    let report = scan(&fixture("vulnerable/all_rules_sample.py"));
    let findings = report.findings();

    assert_eq!(findings[0].rule_id(), "PY-EVAL-001");
    assert_eq!(findings[0].line(), 22);

    let hashes: Vec<(usize, &str)> = findings
        .iter()
        .filter(|f| f.rule_id() == "PY-HASH-001")
        .map(|f| (f.line(), f.snippet()))
        .collect();
    assert_eq!(
        hashes,
        vec![
            (30, "hashlib.md5(...)"),
            (31, "hashlib.sha1(...)"),
            (32, "hashlib.new('md5', ...)"),
        ]
    );

    let last = findings.last().unwrap();
    assert_eq!(last.rule_id(), "PY-FTP-001");
    assert_eq!(last.line(), 44);

    let positions: Vec<usize> = findings
        .iter()
        .map(|f| {
            REGISTRY
                .iter()
                .position(|k| k.meta().id == f.rule_id())
                .unwrap()
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_clean_fixture_has_no_findings() {
    let report = scan(&fixture("clean"));
    assert_eq!(report.files_scanned, 1);
    assert!(report.is_empty(), "{:?}", report.findings());
}

#[test]
fn test_fixture_tree_is_sorted_and_canonical() {
    let report = scan(&fixtures_dir());
    assert_eq!(report.files_discovered, 4);
    let files: Vec<&Path> = report.findings().iter().map(|f| f.file()).collect();
    assert!(files.iter().all(|f| f.is_absolute()));
    assert!(files.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_missing_path_is_fatal() {
    let result = scan_path(Path::new("/definitely/not/here"), &ScanOptions::default());
    assert!(matches!(result, Err(ScanError::PathNotFound(_))));
}

// ─── Determinism ───

#[test]
fn test_repeated_scans_are_identical() {
    let first = scan(&fixtures_dir());
    let second = scan(&fixtures_dir());
    assert_eq!(first.findings(), second.findings());
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn test_parallel_scan_matches_sequential_order() {
    let tmp = tempfile::tempdir().unwrap();
    for i in 0..24 {
        fs::write(
            tmp.path().join(format!("mod_{i:02}.py")),
            format!("import pickle\npickle.loads(x{i})\neval(y)\n"),
        )
        .unwrap();
    }

    let report = scan(tmp.path());
    let mut sequential = Vec::new();
    let mut files: Vec<PathBuf> = fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().path().canonicalize().unwrap())
        .collect();
    files.sort();
    for file in &files {
        sequential.extend(analyzer::scan_file(file).unwrap());
    }
    assert_eq!(report.findings(), sequential.as_slice());
    assert_eq!(report.total_findings(), 48);
}

// ─── Output formats ───

#[test]
fn test_json_report_shape() {
    let report = scan(&fixture("vulnerable"));
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["total_findings"], 23);
    let first = &json["findings"][0];
    for key in [
        "rule_id",
        "severity",
        "title",
        "file",
        "line",
        "snippet",
        "explanation",
        "exploit_scenario",
        "remediation",
    ] {
        assert!(first.get(key).is_some(), "missing {key}");
    }
    assert!(first["explanation"].is_null());
}

#[test]
fn test_sarif_has_one_rule_per_id() {
    let report = scan(&fixture("vulnerable"));
    let log = sarif::to_sarif(&report);
    let rules = log["runs"][0]["tool"]["driver"]["rules"].as_array().unwrap();
    assert_eq!(rules.len(), REGISTRY.len());
    let results = log["runs"][0]["results"].as_array().unwrap();
    assert_eq!(results.len(), 23);
}

// ─── Enrichment ───

#[tokio::test]
async fn test_enrichment_does_not_change_detection() {
    let report = scan(&fixture("vulnerable"));
    let before_worst = report.worst_severity();
    let before_gate = report.gate(Some(Severity::High));

    let enriched = Explainer::template()
        .enrich_all(report.findings().to_vec())
        .await;
    let enriched_report = ScanReport::new(enriched);

    assert_eq!(enriched_report.total_findings(), report.total_findings());
    for (a, b) in report.findings().iter().zip(enriched_report.findings()) {
        assert_eq!(a.rule_id(), b.rule_id());
        assert_eq!(a.severity(), b.severity());
        assert_eq!(a.file(), b.file());
        assert_eq!(a.line(), b.line());
        assert_eq!(a.snippet(), b.snippet());
        assert!(b.remediation().is_some());
    }
    assert_eq!(enriched_report.worst_severity(), before_worst);
    assert_eq!(enriched_report.gate(Some(Severity::High)), before_gate);
}

#[tokio::test]
async fn test_unreachable_model_server_uses_fallback() {
    // Bind then drop so the port is very likely closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let explainer = Explainer::new(ExplainerConfig {
        provider: Provider::Ollama,
        endpoint: format!("http://127.0.0.1:{port}"),
        timeout: std::time::Duration::from_secs(5),
        ..ExplainerConfig::default()
    });

    let findings = scan_source("eval(x)\n", Path::new("e.py")).unwrap();
    let enriched = explainer.enrich_all(findings).await;
    assert_eq!(enriched.len(), 1);
    assert_eq!(enriched[0].explanation(), Some(explainer::FALLBACK_EXPLANATION));
    assert_eq!(enriched[0].remediation(), Some(explainer::FALLBACK_REMEDIATION));
    assert_eq!(enriched[0].severity(), Severity::High);
}
