//! Rule engine: the detector contract, traversal dispatch and the concrete
//! rule catalog.

pub mod aliases;
pub mod call;
pub mod crypto;
pub mod deserialization;
pub mod execution;
pub mod filesystem;
pub mod network;
pub mod registry;

use std::path::{Path, PathBuf};

use crate::analyzer::report::{Finding, Severity};
use crate::syntax::{Assign, Call, ImportAlias, ImportFrom, NodeKind, NodeTag, SyntaxTree};

pub use aliases::{AliasContext, Binding, QualifiedName};
pub use registry::{lookup, run_rules, RuleKind, REGISTRY};

/// Broad class of a rule, used for grouping and offline explanations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleFamily {
    CodeExecution,
    CommandExecution,
    Deserialization,
    WeakCrypto,
    InsecureTransport,
    InsecureProtocol,
    TempFile,
}

impl RuleFamily {
    pub fn label(&self) -> &str {
        match self {
            RuleFamily::CodeExecution => "Dynamic Code Execution",
            RuleFamily::CommandExecution => "OS Command Execution",
            RuleFamily::Deserialization => "Unsafe Deserialization",
            RuleFamily::WeakCrypto => "Weak Cryptography",
            RuleFamily::InsecureTransport => "Insecure TLS",
            RuleFamily::InsecureProtocol => "Cleartext Protocol",
            RuleFamily::TempFile => "Insecure Temporary File",
        }
    }
}

/// Identity shared by every finding a rule produces.
#[derive(Debug, PartialEq, Eq)]
pub struct RuleMeta {
    pub id: &'static str,
    pub severity: Severity,
    pub title: &'static str,
    pub family: RuleFamily,
}

/// A single self-contained check, instantiated fresh for every file.
///
/// The walker calls only the handlers for the node kinds listed in
/// [`Detector::interests`]; the defaults are no-ops.
pub trait Detector {
    fn meta(&self) -> &'static RuleMeta;

    fn interests(&self) -> &'static [NodeTag] {
        &[NodeTag::Import, NodeTag::ImportFrom, NodeTag::Call]
    }

    fn on_import(&mut self, _aliases: &[ImportAlias], _line: usize) {}

    fn on_import_from(&mut self, _from: &ImportFrom, _line: usize) {}

    fn on_assign(&mut self, _assign: &Assign, _line: usize) {}

    fn on_rebind(&mut self, _names: &[String], _line: usize) {}

    fn on_call(&mut self, _call: &Call, _line: usize) {}

    /// Findings in traversal order. Consumes the detector and its aliases.
    fn finish(self: Box<Self>) -> Vec<Finding>;
}

/// Drive one detector over the whole tree in pre-order.
pub fn walk(tree: &SyntaxTree, detector: &mut dyn Detector) {
    let interests = detector.interests();
    for node in tree.nodes() {
        if !interests.contains(&node.tag()) {
            continue;
        }
        match &node.kind {
            NodeKind::Import(aliases) => detector.on_import(aliases, node.line),
            NodeKind::ImportFrom(from) => detector.on_import_from(from, node.line),
            NodeKind::Assign(assign) => detector.on_assign(assign, node.line),
            NodeKind::Rebind(rebind) => detector.on_rebind(&rebind.names, node.line),
            NodeKind::Call(call) => detector.on_call(call, node.line),
            _ => {}
        }
    }
}

/// State every detector carries for one file: its identity, its own alias
/// table and the findings collected so far.
#[derive(Debug)]
pub struct RuleScope {
    pub file: PathBuf,
    pub aliases: AliasContext,
    findings: Vec<Finding>,
}

impl RuleScope {
    pub fn new(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            aliases: AliasContext::new(),
            findings: Vec::new(),
        }
    }

    pub fn report(&mut self, meta: &RuleMeta, line: usize, snippet: String) {
        self.findings.push(Finding::new(
            self.file.clone(),
            line,
            meta.id,
            meta.severity,
            meta.title,
            snippet,
        ));
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

/// Normalized `callee(...)` text for a resolved target.
pub fn call_snippet(target: &QualifiedName, extra: Option<&str>) -> String {
    match extra {
        Some(extra) => format!("{}(..., {})", target.display_name(), extra),
        None => format!("{}(...)", target.display_name()),
    }
}
