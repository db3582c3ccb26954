//! Dynamic code evaluation and OS command execution.

use super::call::{CallSpec, KeywordFlagSpec};
use super::{RuleFamily, RuleMeta};
use crate::analyzer::report::Severity;

pub static EVAL: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-EVAL-001",
        severity: Severity::High,
        title: "Use of eval()",
        family: RuleFamily::CodeExecution,
    },
    targets: &["builtins.eval"],
};

pub static EXEC: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-EXEC-001",
        severity: Severity::High,
        title: "Use of exec()",
        family: RuleFamily::CodeExecution,
    },
    targets: &["builtins.exec"],
};

pub static OS_SYSTEM: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-OS-SYSTEM-001",
        severity: Severity::High,
        title: "Use of os.system()",
        family: RuleFamily::CommandExecution,
    },
    targets: &["os.system"],
};

pub static SUBPROCESS_SHELL: KeywordFlagSpec = KeywordFlagSpec {
    meta: RuleMeta {
        id: "PY-SUBPROCESS-001",
        severity: Severity::High,
        title: "subprocess call with shell=True",
        family: RuleFamily::CommandExecution,
    },
    targets: &[
        "subprocess.run",
        "subprocess.call",
        "subprocess.check_call",
        "subprocess.check_output",
        "subprocess.Popen",
    ],
    keyword: "shell",
    unsafe_value: true,
};
