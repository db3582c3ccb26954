//! Disabled certificate checks and cleartext protocols.

use super::call::{CallSpec, KeywordFlagSpec};
use super::{RuleFamily, RuleMeta};
use crate::analyzer::report::Severity;

pub static TLS_VERIFY_DISABLED: KeywordFlagSpec = KeywordFlagSpec {
    meta: RuleMeta {
        id: "PY-TLS-VERIFY-001",
        severity: Severity::High,
        title: "TLS certificate verification disabled",
        family: RuleFamily::InsecureTransport,
    },
    targets: &[
        "requests.get",
        "requests.post",
        "requests.put",
        "requests.patch",
        "requests.delete",
        "requests.head",
        "requests.options",
        "requests.request",
        "httpx.get",
        "httpx.post",
        "httpx.put",
        "httpx.patch",
        "httpx.delete",
        "httpx.head",
        "httpx.options",
        "httpx.request",
    ],
    keyword: "verify",
    unsafe_value: false,
};

pub static SSL_UNVERIFIED_CONTEXT: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-SSL-UNVERIFIED-001",
        severity: Severity::High,
        title: "Use of ssl._create_unverified_context()",
        family: RuleFamily::InsecureTransport,
    },
    targets: &["ssl._create_unverified_context"],
};

pub static TELNET: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-TELNET-001",
        severity: Severity::High,
        title: "Use of insecure Telnet protocol",
        family: RuleFamily::InsecureProtocol,
    },
    targets: &["telnetlib.Telnet"],
};

pub static FTP: CallSpec = CallSpec {
    meta: RuleMeta {
        id: "PY-FTP-001",
        severity: Severity::Medium,
        title: "Use of insecure FTP protocol",
        family: RuleFamily::InsecureProtocol,
    },
    targets: &["ftplib.FTP"],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::report::Finding;
    use crate::rules::registry::{run_rule, RuleKind};
    use crate::syntax::parse_source;
    use std::path::Path;

    fn run(kind: RuleKind, source: &str) -> Vec<Finding> {
        let tree = parse_source(source, Path::new("net.py")).unwrap();
        run_rule(&kind, &tree, Path::new("net.py"))
    }

    #[test]
    fn test_requests_verify_false() {
        let source = "import requests\nrequests.get(url, verify=False)\nrequests.post(url, verify=True)\nrequests.put(url)\n";
        let findings = run(RuleKind::KeywordFlag(&TLS_VERIFY_DISABLED), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line(), 2);
        assert_eq!(findings[0].snippet(), "requests.get(..., verify=False)");
    }

    #[test]
    fn test_httpx_verify_false_through_from_import() {
        let source = "from httpx import request as fetch\nfetch('GET', url, verify=False)\n";
        let findings = run(RuleKind::KeywordFlag(&TLS_VERIFY_DISABLED), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].snippet(), "httpx.request(..., verify=False)");
    }

    #[test]
    fn test_verify_from_variable_is_ignored() {
        let source = "import requests\nrequests.get(url, verify=settings.VERIFY)\n";
        assert!(run(RuleKind::KeywordFlag(&TLS_VERIFY_DISABLED), source).is_empty());
    }

    #[test]
    fn test_session_methods_are_not_tracked() {
        let source = "import requests\ns = requests.Session()\ns.get(url, verify=False)\n";
        assert!(run(RuleKind::KeywordFlag(&TLS_VERIFY_DISABLED), source).is_empty());
    }

    #[test]
    fn test_unverified_ssl_context() {
        let findings = run(
            RuleKind::Call(&SSL_UNVERIFIED_CONTEXT),
            "import ssl\nctx = ssl._create_unverified_context()\n",
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id(), "PY-SSL-UNVERIFIED-001");
    }

    #[test]
    fn test_telnet_triggers() {
        let findings = run(
            RuleKind::Call(&TELNET),
            "from telnetlib import Telnet\nconn = Telnet(host)\n",
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].snippet(), "telnetlib.Telnet(...)");
    }

    #[test]
    fn test_ftp_triggers_but_ftp_tls_does_not() {
        let source = "import ftplib\nftplib.FTP(host)\nftplib.FTP_TLS(host)\n";
        let findings = run(RuleKind::Call(&FTP), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line(), 2);
        assert_eq!(findings[0].severity(), Severity::Medium);
    }
}
