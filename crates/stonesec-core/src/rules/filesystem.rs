use super::call::CallSpec;
use super::{RuleFamily, RuleMeta};
use crate::analyzer::report::Severity;

pub static TEMPFILE_MKTEMP: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-TEMPFILE-001",
        severity: Severity::Medium,
        title: "Use of insecure tempfile.mktemp()",
        family: RuleFamily::TempFile,
    },
    targets: &["tempfile.mktemp"],
};
