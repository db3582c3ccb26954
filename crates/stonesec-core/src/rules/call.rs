//! Generic call-site detectors. Most rules are one of these two shapes
//! with a different target list.

use std::path::Path;

use super::{call_snippet, Detector, RuleMeta, RuleScope};
use crate::analyzer::report::Finding;
use crate::syntax::{Call, Constant, ImportAlias, ImportFrom, Node};

/// Flags any call whose callee resolves to one of `targets`.
#[derive(Debug)]
pub struct CallSpec {
    pub meta: RuleMeta,
    pub targets: &'static [&'static str],
}

pub struct CallRule {
    spec: &'static CallSpec,
    scope: RuleScope,
}

impl CallRule {
    pub fn new(file: &Path, spec: &'static CallSpec) -> Self {
        Self {
            spec,
            scope: RuleScope::new(file),
        }
    }
}

impl Detector for CallRule {
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
        if let Some(target) = self.scope.aliases.resolve(&call.func) {
            if target.is_any(self.spec.targets) {
                self.scope
                    .report(&self.spec.meta, line, call_snippet(&target, None));
            }
        }
    }

    fn finish(self: Box<Self>) -> Vec<Finding> {
        self.scope.into_findings()
    }
}

/// Flags a call into `targets` that passes `keyword` as the literal
/// `unsafe_value`. Non-literal values never match.
#[derive(Debug)]
pub struct KeywordFlagSpec {
    pub meta: RuleMeta,
    pub targets: &'static [&'static str],
    pub keyword: &'static str,
    pub unsafe_value: bool,
}

pub struct KeywordFlagRule {
    spec: &'static KeywordFlagSpec,
    scope: RuleScope,
}

impl KeywordFlagRule {
    pub fn new(file: &Path, spec: &'static KeywordFlagSpec) -> Self {
        Self {
            spec,
            scope: RuleScope::new(file),
        }
    }

    fn has_unsafe_flag(&self, call: &Call) -> bool {
        call.keyword(self.spec.keyword)
            .and_then(Node::as_constant)
            .is_some_and(|value| *value == Constant::Bool(self.spec.unsafe_value))
    }
}

impl Detector for KeywordFlagRule {
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
        if target.is_any(self.spec.targets) && self.has_unsafe_flag(call) {
            let flag = format!(
                "{}={}",
                self.spec.keyword,
                if self.spec.unsafe_value { "True" } else { "False" }
            );
            self.scope
                .report(&self.spec.meta, line, call_snippet(&target, Some(&flag)));
        }
    }

    fn finish(self: Box<Self>) -> Vec<Finding> {
        self.scope.into_findings()
    }
}
