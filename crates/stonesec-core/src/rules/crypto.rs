//! Weak message digests.

use std::path::Path;

use super::{call_snippet, Detector, RuleFamily, RuleMeta, RuleScope};
use crate::analyzer::report::{Finding, Severity};
use crate::syntax::{Call, Constant, ImportAlias, ImportFrom, Node};

#[derive(Debug)]
pub struct WeakHashSpec {
    pub meta: RuleMeta,
    /// Constructors that always build a weak digest.
    pub constructors: &'static [&'static str],
    /// Factories taking the algorithm name as first positional argument.
    pub factories: &'static [&'static str],
    /// Lowercase algorithm names considered weak.
    pub weak_algorithms: &'static [&'static str],
}

pub static WEAK_HASH: WeakHashSpec = WeakHashSpec {
    meta: RuleMeta {
        id: "PY-HASH-001",
        severity: Severity::Medium,
        title: "Use of weak hash algorithm",
        family: RuleFamily::WeakCrypto,
    },
    constructors: &["hashlib.md5", "hashlib.sha1"],
    factories: &["hashlib.new"],
    weak_algorithms: &["md4", "md5", "sha1", "md5-sha1"],
};

pub struct WeakHashRule {
    spec: &'static WeakHashSpec,
    scope: RuleScope,
}

impl WeakHashRule {
    pub fn new(file: &Path, spec: &'static WeakHashSpec) -> Self {
        Self {
            spec,
            scope: RuleScope::new(file),
        }
    }

    /// Literal algorithm name passed first, if it is a weak one.
    fn weak_algorithm<'c>(&self, call: &'c Call) -> Option<&'c str> {
        let Some(Constant::Str(name)) = call.args.first().and_then(Node::as_constant) else {
            return None;
        };
        let lowered = name.to_ascii_lowercase();
        self.spec
            .weak_algorithms
            .contains(&lowered.as_str())
            .then_some(name.as_str())
    }
}

impl Detector for WeakHashRule {
    fn meta(&self) -> &'static RuleMeta {
        &self.spec.meta
    }

    fn on_import(&mut self, aliases: &[ImportAlias], _line: usize) {
        self.scope.aliases.bind_import(aliases);
    }

    fn on_import_from(&mut self, from: &ImportFrom, _line: usize) {
        self.scope.aliases.bind_import_from(from);
    }

    fn on_call(&mut self, call: &Call, line: usize) {
        let Some(target) = self.scope.aliases.resolve(&call.func) else {
            return;
        };

        if target.is_any(self.spec.constructors) {
            self.scope
                .report(&self.spec.meta, line, call_snippet(&target, None));
        } else if target.is_any(self.spec.factories) {
            if let Some(algorithm) = self.weak_algorithm(call) {
                let snippet = format!("{}('{}', ...)", target.display_name(), algorithm);
                self.scope.report(&self.spec.meta, line, snippet);
            }
        }
    }

    fn finish(self: Box<Self>) -> Vec<Finding> {
        self.scope.into_findings()
    }
}
