//! The fixed rule catalog and the runner that applies it to one tree.

use std::path::Path;

use super::call::{CallRule, CallSpec, KeywordFlagRule, KeywordFlagSpec};
use super::crypto::{WeakHashRule, WeakHashSpec, WEAK_HASH};
use super::deserialization::{self, DefaultLoaderRule, DefaultLoaderSpec};
use super::{execution, filesystem, network, walk, Detector, RuleMeta};
use crate::analyzer::report::Finding;
use crate::syntax::SyntaxTree;

/// A registered detector shape paired with its static configuration.
#[derive(Debug, Clone, Copy)]
pub enum RuleKind {
    Call(&'static CallSpec),
    KeywordFlag(&'static KeywordFlagSpec),
    WeakHash(&'static WeakHashSpec),
    DefaultLoader(&'static DefaultLoaderSpec),
}

impl RuleKind {
    pub fn meta(&self) -> &'static RuleMeta {
        match self {
            RuleKind::Call(spec) => &spec.meta,
            RuleKind::KeywordFlag(spec) => &spec.meta,
            RuleKind::WeakHash(spec) => &spec.meta,
            RuleKind::DefaultLoader(spec) => &spec.meta,
        }
    }

    /// Fresh detector for one file. Nothing is shared between instances.
    pub fn instantiate(&self, file: &Path) -> Box<dyn Detector> {
        match *self {
            RuleKind::Call(spec) => Box::new(CallRule::new(file, spec)),
            RuleKind::KeywordFlag(spec) => Box::new(KeywordFlagRule::new(file, spec)),
            RuleKind::WeakHash(spec) => Box::new(WeakHashRule::new(file, spec)),
            RuleKind::DefaultLoader(spec) => Box::new(DefaultLoaderRule::new(file, spec)),
        }
    }
}

pub static REGISTRY: &[RuleKind] = &[
    RuleKind::Call(&execution::EVAL),
    RuleKind::Call(&execution::EXEC),
    RuleKind::Call(&execution::OS_SYSTEM),
    RuleKind::KeywordFlag(&execution::SUBPROCESS_SHELL),
    RuleKind::Call(&deserialization::PICKLE),
    RuleKind::DefaultLoader(&deserialization::YAML_LOAD),
    RuleKind::Call(&deserialization::YAML_UNSAFE_LOAD),
    RuleKind::Call(&filesystem::TEMPFILE_MKTEMP),
    RuleKind::WeakHash(&WEAK_HASH),
    RuleKind::Call(&deserialization::MARSHAL),
    RuleKind::Call(&deserialization::DILL),
    RuleKind::Call(&deserialization::JSONPICKLE),
    RuleKind::KeywordFlag(&deserialization::NUMPY_ALLOW_PICKLE),
    RuleKind::Call(&deserialization::PANDAS_READ_PICKLE),
    RuleKind::Call(&deserialization::TORCH_LOAD),
    RuleKind::Call(&deserialization::JOBLIB_LOAD),
    RuleKind::KeywordFlag(&network::TLS_VERIFY_DISABLED),
    RuleKind::Call(&network::SSL_UNVERIFIED_CONTEXT),
    RuleKind::Call(&network::TELNET),
    RuleKind::Call(&network::FTP),
];

pub fn lookup(rule_id: &str) -> Option<&'static RuleKind> {
    REGISTRY.iter().find(|kind| kind.meta().id == rule_id)
}

pub fn run_rule(kind: &RuleKind, tree: &SyntaxTree, file: &Path) -> Vec<Finding> {
    let mut detector = kind.instantiate(file);
    walk(tree, detector.as_mut());
    detector.finish()
}

/// Every registered rule over `tree`, concatenated in registry order.
pub fn run_rules(tree: &SyntaxTree, file: &Path) -> Vec<Finding> {
    REGISTRY
        .iter()
        .flat_map(|kind| run_rule(kind, tree, file))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;
    use std::collections::HashSet;

    const MIXED: &str = "\
import yaml
import hashlib
import pickle as p
hashlib.md5(b'x')
yaml.load(doc)
eval(expr)
p.loads(blob)
";

    fn findings_for(source: &str) -> Vec<Finding> {
        let tree = parse_source(source, Path::new("mixed.py")).unwrap();
        run_rules(&tree, Path::new("mixed.py"))
    }

    #[test]
    fn test_registry_ids_are_unique() {
        let ids: HashSet<&str> = REGISTRY.iter().map(|k| k.meta().id).collect();
        assert_eq!(ids.len(), REGISTRY.len());
        assert_eq!(REGISTRY.len(), 20);
    }

    #[test]
    fn test_lookup() {
        let kind = lookup("PY-FTP-001").unwrap();
        assert_eq!(kind.meta().title, "Use of insecure FTP protocol");
        assert!(lookup("PY-NOPE-001").is_none());
    }

    #[test]
    fn test_findings_follow_registry_order_not_source_order() {
        let findings = findings_for(MIXED);
        let ids: Vec<&str> = findings.iter().map(|f| f.rule_id()).collect();
        assert_eq!(
            ids,
            vec!["PY-EVAL-001", "PY-PICKLE-001", "PY-YAML-001", "PY-HASH-001"]
        );
    }

    #[test]
    fn test_runs_are_deterministic() {
        assert_eq!(findings_for(MIXED), findings_for(MIXED));
    }

    #[test]
    fn test_detectors_are_independent() {
        let tree = parse_source(MIXED, Path::new("mixed.py")).unwrap();
        let all = run_rules(&tree, Path::new("mixed.py"));
        let mut separately = Vec::new();
        for kind in REGISTRY {
            separately.extend(run_rule(kind, &tree, Path::new("mixed.py")));
        }
        assert_eq!(all, separately);

        let pickle_only = run_rule(
            lookup("PY-PICKLE-001").unwrap(),
            &tree,
            Path::new("mixed.py"),
        );
        let from_all: Vec<&Finding> = all
            .iter()
            .filter(|f| f.rule_id() == "PY-PICKLE-001")
            .collect();
        assert_eq!(pickle_only.iter().collect::<Vec<_>>(), from_all);
    }

    #[test]
    fn test_clean_source_has_no_findings() {
        assert!(findings_for("import json\njson.loads(s)\nprint(len(s))\n").is_empty());
    }
}
