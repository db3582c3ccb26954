//! Deserialization entry points that can instantiate arbitrary objects.

use std::path::Path;

use super::call::{CallSpec, KeywordFlagSpec};
use super::{call_snippet, Detector, RuleFamily, RuleMeta, RuleScope};
use crate::analyzer::report::{Finding, Severity};
use crate::syntax::{Assign, Call, ImportAlias, ImportFrom, NodeTag};

pub static PICKLE: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-PICKLE-001",
        severity: Severity::High,
        title: "Use of insecure pickle deserialization",
        family: RuleFamily::Deserialization,
    },
    targets: &[
        "pickle.load",
        "pickle.loads",
        "pickle.Unpickler",
        "cPickle.load",
        "cPickle.loads",
        "cPickle.Unpickler",
        "_pickle.load",
        "_pickle.loads",
        "_pickle.Unpickler",
    ],
};

/// A loader that is unsafe unless a safe mode is selected explicitly.
#[derive(Debug)]
pub struct DefaultLoaderSpec {
    pub meta: RuleMeta,
    pub loaders: &'static [&'static str],
    /// Zero-based index of the positional loader selector.
    pub selector_position: usize,
    pub selector_keyword: &'static str,
    pub safe_markers: &'static [&'static str],
}

pub static YAML_LOAD: DefaultLoaderSpec = DefaultLoaderSpec {
    meta: RuleMeta {
        id: "PY-YAML-001",
        severity: Severity::High,
        title: "Use of yaml.load() without a safe Loader",
        family: RuleFamily::Deserialization,
    },
    loaders: &["yaml.load"],
    selector_position: 1,
    selector_keyword: "Loader",
    safe_markers: &[
        "yaml.SafeLoader",
        "yaml.CSafeLoader",
        "yaml.loader.SafeLoader",
        "yaml.cyaml.CSafeLoader",
    ],
};

/// Fail-closed detector: a loader call passes only when its selector
/// provably resolves to a safe marker.
pub struct DefaultLoaderRule {
    spec: &'static DefaultLoaderSpec,
    scope: RuleScope,
}

impl DefaultLoaderRule {
    pub fn new(file: &Path, spec: &'static DefaultLoaderSpec) -> Self {
        Self {
            spec,
            scope: RuleScope::new(file),
        }
    }

    fn selects_safe_mode(&self, call: &Call) -> bool {
        let selector = call
            .keyword(self.spec.selector_keyword)
            .or_else(|| call.args.get(self.spec.selector_position));
        selector
            .and_then(|node| self.scope.aliases.resolve(node))
            .is_some_and(|resolved| resolved.is_any(self.spec.safe_markers))
    }
}

impl Detector for DefaultLoaderRule {
    fn meta(&self) -> &'static RuleMeta {
        &self.spec.meta
    }

    fn interests(&self) -> &'static [NodeTag] {
        &[
            NodeTag::Import,
            NodeTag::ImportFrom,
            NodeTag::Assign,
            NodeTag::Rebind,
            NodeTag::Call,
        ]
    }

    fn on_import(&mut self, aliases: &[ImportAlias], _line: usize) {
        self.scope.aliases.bind_import(aliases);
    }

    fn on_import_from(&mut self, from: &ImportFrom, _line: usize) {
        self.scope.aliases.bind_import_from(from);
    }

    fn on_assign(&mut self, assign: &Assign, _line: usize) {
        let markers = self.spec.safe_markers;
        self.scope
            .aliases
            .track_assignment(assign, |resolved| resolved.is_any(markers));
    }

    fn on_rebind(&mut self, names: &[String], _line: usize) {
        self.scope.aliases.unbind(names);
    }

    fn on_call(&mut self, call: &Call, line: usize) {
        let Some(target) = self.scope.aliases.resolve(&call.func) else {
            return;
        };
        if target.is_any(self.spec.loaders) && !self.selects_safe_mode(call) {
            self.scope
                .report(&self.spec.meta, line, call_snippet(&target, None));
        }
    }

    fn finish(self: Box<Self>) -> Vec<Finding> {
        self.scope.into_findings()
    }
}

pub static YAML_UNSAFE_LOAD: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-YAML-002",
        severity: Severity::High,
        title: "Use of unsafe YAML loader",
        family: RuleFamily::Deserialization,
    },
    targets: &["yaml.full_load", "yaml.unsafe_load"],
};

pub static MARSHAL: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-MARSHAL-001",
        severity: Severity::High,
        title: "Use of insecure marshal deserialization",
        family: RuleFamily::Deserialization,
    },
    targets: &["marshal.load", "marshal.loads"],
};

pub static DILL: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-DILL-001",
        severity: Severity::High,
        title: "Use of insecure dill deserialization",
        family: RuleFamily::Deserialization,
    },
    targets: &["dill.load", "dill.loads"],
};

pub static JSONPICKLE: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-JSONPICKLE-001",
        severity: Severity::High,
        title: "Use of insecure jsonpickle.decode()",
        family: RuleFamily::Deserialization,
    },
    targets: &["jsonpickle.decode"],
};

pub static NUMPY_ALLOW_PICKLE: KeywordFlagSpec = KeywordFlagSpec {
    meta: RuleMeta {
        id: "PY-NUMPY-001",
        severity: Severity::High,
        title: "Use of numpy.load(..., allow_pickle=True)",
        family: RuleFamily::Deserialization,
    },
    targets: &["numpy.load"],
    keyword: "allow_pickle",
    unsafe_value: true,
};

pub static PANDAS_READ_PICKLE: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-PANDAS-001",
        severity: Severity::High,
        title: "Use of insecure pandas.read_pickle()",
        family: RuleFamily::Deserialization,
    },
    targets: &["pandas.read_pickle"],
};

pub static TORCH_LOAD: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-TORCH-001",
        severity: Severity::High,
        title: "Use of potentially unsafe torch.load()",
        family: RuleFamily::Deserialization,
    },
    targets: &["torch.load"],
};

pub static JOBLIB_LOAD: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-JOBLIB-001",
        severity: Severity::High,
        title: "Use of potentially unsafe joblib.load()",
        family: RuleFamily::Deserialization,
    },
    targets: &["joblib.load"],
};
