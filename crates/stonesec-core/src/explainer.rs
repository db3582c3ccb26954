//! Natural-language enrichment for findings.
//!
//! Supports a local Ollama server and a template-based offline provider.
//! Enrichment only ever fills the optional text fields of a finding; any
//! provider failure degrades to fixed fallback text.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analyzer::report::{Enrichment, Finding};
use crate::rules::{self, RuleFamily};

pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const FALLBACK_EXPLANATION: &str = "Potential security risk detected.";
pub const FALLBACK_EXPLOIT_SCENARIO: &str =
    "An attacker could abuse this behavior if input is controlled.";
pub const FALLBACK_REMEDIATION: &str = "Avoid unsafe constructs and validate inputs.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    Template,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Ollama => "ollama",
            Provider::Template => "template",
        })
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "template" => Ok(Provider::Template),
            other => Err(format!(
                "unknown enrichment provider '{other}' (expected ollama or template)"
            )),
        }
    }
}

/// Provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainerConfig {
    pub provider: Provider,
    pub model: String,
    /// Base URL of the Ollama server.
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ExplainerConfig {
    /// Defaults, with the endpoint taken from `OLLAMA_HOST` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            if !host.trim().is_empty() {
                config.endpoint = normalize_endpoint(&host);
            }
        }
        config
    }
}

/// `OLLAMA_HOST` is commonly given without a scheme.
fn normalize_endpoint(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    format: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// The explainer that enriches findings.
pub struct Explainer {
    config: ExplainerConfig,
    client: reqwest::Client,
}

impl Explainer {
    pub fn new(config: ExplainerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a template-based explainer (no model server required).
    pub fn template() -> Self {
        Self::new(ExplainerConfig {
            provider: Provider::Template,
            ..ExplainerConfig::default()
        })
    }

    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }

    /// Enrichment for one finding. Never fails.
    pub async fn explain(&self, finding: &Finding) -> Enrichment {
        match self.config.provider {
            Provider::Template => template_enrichment(finding),
            Provider::Ollama => {
                match tokio::time::timeout(self.config.timeout, self.explain_ollama(finding)).await
                {
                    Ok(Ok(enrichment)) => enrichment,
                    Ok(Err(err)) => {
                        warn!(rule = finding.rule_id(), error = %format!("{err:#}"), "enrichment failed, using fallback");
                        fallback()
                    }
                    Err(_) => {
                        warn!(
                            rule = finding.rule_id(),
                            timeout_secs = self.config.timeout.as_secs_f64(),
                            "enrichment timed out, using fallback"
                        );
                        fallback()
                    }
                }
            }
        }
    }

    async fn explain_ollama(&self, finding: &Finding) -> Result<Enrichment> {
        let prompt = build_prompt(finding);
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        debug!(url = %url, model = %self.config.model, rule = finding.rule_id(), "requesting enrichment");

        let resp = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.config.model,
                prompt: &prompt,
                format: "json",
                stream: false,
            })
            .send()
            .await
            .context("Failed to call Ollama API")?
            .error_for_status()
            .context("Ollama API returned an error status")?;

        let body: GenerateResponse = resp.json().await.context("Failed to parse response")?;
        parse_response(&body.response).context("Model output is not a JSON object")
    }

    /// Enrichments for all findings, in order.
    pub async fn explain_all(&self, findings: &[Finding]) -> Vec<Enrichment> {
        let mut enrichments = Vec::with_capacity(findings.len());
        for finding in findings {
            enrichments.push(self.explain(finding).await);
        }
        enrichments
    }

    /// Enriched copies of `findings`; order, length and detection fields
    /// are preserved.
    pub async fn enrich_all(&self, findings: Vec<Finding>) -> Vec<Finding> {
        let enrichments = self.explain_all(&findings).await;
        findings
            .into_iter()
            .zip(enrichments)
            .map(|(finding, enrichment)| finding.enriched(enrichment))
            .collect()
    }
}

/// JSON-only prompt built from the detection fields.
pub fn build_prompt(finding: &Finding) -> String {
    format!(
        "You are a security analysis engine.\n\
         Analyze the following security finding and return ONLY valid JSON with keys:\n\
         - explanation\n\
         - exploit_scenario\n\
         - remediation\n\n\
         Finding details:\n\
         - Rule: {}\n\
         - Title: {}\n\
         - Severity: {}\n\
         - File: {}\n\
         - Line: {}\n\
         - Code Snippet: {}\n\n\
         Rules:\n\
         - Do not include any text outside JSON\n\
         - Do not change severity\n\
         - Do not invent vulnerabilities\n",
        finding.rule_id(),
        finding.title(),
        finding.severity().symbol(),
        finding.file().display(),
        finding.line(),
        finding.snippet(),
    )
}

/// Parse model output into an enrichment. Missing keys become empty
/// strings; anything that is not a JSON object is rejected.
pub fn parse_response(text: &str) -> Option<Enrichment> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    let object = value.as_object()?;
    let field = |key: &str| {
        Some(
            object
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        )
    };
    Some(Enrichment {
        explanation: field("explanation"),
        exploit_scenario: field("exploit_scenario"),
        remediation: field("remediation"),
    })
}

pub fn fallback() -> Enrichment {
    Enrichment {
        explanation: Some(FALLBACK_EXPLANATION.to_string()),
        exploit_scenario: Some(FALLBACK_EXPLOIT_SCENARIO.to_string()),
        remediation: Some(FALLBACK_REMEDIATION.to_string()),
    }
}

/// Static guidance keyed by the rule family.
fn template_enrichment(finding: &Finding) -> Enrichment {
    let Some(kind) = rules::lookup(finding.rule_id()) else {
        return fallback();
    };

    let (explanation, exploit, remediation) = match kind.meta().family {
        RuleFamily::CodeExecution => (
            "Dynamically evaluated code runs with the full privileges of the process.",
            "If any part of the evaluated text is attacker-controlled, the attacker can run arbitrary Python.",
            "Replace dynamic evaluation with explicit parsing such as ast.literal_eval or a dispatch table.",
        ),
        RuleFamily::CommandExecution => (
            "The command string is interpreted by a system shell.",
            "Shell metacharacters in user input let an attacker chain additional commands.",
            "Pass an argument list to subprocess without shell=True and validate every argument.",
        ),
        RuleFamily::Deserialization => (
            "This deserializer can reconstruct arbitrary objects and invoke code while loading.",
            "A crafted payload executes attacker-chosen code as soon as it is loaded.",
            "Load untrusted data only with data-only formats such as JSON or yaml.safe_load.",
        ),
        RuleFamily::WeakCrypto => (
            "This digest algorithm is broken for collision resistance.",
            "An attacker can craft colliding inputs that verify as the same content.",
            "Use SHA-256 or stronger, or pass usedforsecurity=False for non-security checksums.",
        ),
        RuleFamily::InsecureTransport => (
            "TLS certificate verification is disabled for this connection.",
            "A network attacker can intercept and modify traffic with a forged certificate.",
            "Keep verification enabled and point verify at a trusted CA bundle if needed.",
        ),
        RuleFamily::InsecureProtocol => (
            "This protocol sends credentials and data in cleartext.",
            "Anyone on the network path can read or tamper with the session.",
            "Use an encrypted alternative such as SSH, SFTP or FTP_TLS.",
        ),
        RuleFamily::TempFile => (
            "The returned path is predictable and is not created atomically.",
            "Another process can create the file first and redirect writes to a file it controls.",
            "Use tempfile.mkstemp or NamedTemporaryFile, which create the file securely.",
        ),
    };

    Enrichment {
        explanation: Some(format!("{} ({})", explanation, finding.snippet())),
        exploit_scenario: Some(exploit.to_string()),
        remediation: Some(remediation.to_string()),
    }
}
