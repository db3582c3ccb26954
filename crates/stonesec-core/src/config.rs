//! Optional `stonesec.toml` configuration.
//!
//! ```toml
//! fail_on = "high"
//! format = "json"
//! exclude = ["generated", "third_party"]
//!
//! [enrichment]
//! provider = "ollama"
//! model = "llama3"
//! endpoint = "http://localhost:11434"
//! timeout_secs = 60
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::analyzer::report::Severity;
use crate::error::ScanError;
use crate::explainer::{ExplainerConfig, Provider};

/// File names probed next to the scan target, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["stonesec.toml", ".stonesec.toml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Sarif,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
            ReportFormat::Sarif => "sarif",
        })
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "sarif" => Ok(ReportFormat::Sarif),
            other => Err(format!(
                "unknown output format '{other}' (expected text, json or sarif)"
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    fail_on: Option<String>,
    format: Option<String>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    enrichment: RawEnrichment,
}

#[derive(Debug, Default, Deserialize)]
struct RawEnrichment {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
}

/// Validated configuration. Every field is optional so command-line flags
/// can take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub fail_on: Option<Severity>,
    pub format: Option<ReportFormat>,
    pub exclude: Vec<String>,
    pub enrichment: EnrichmentSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentSettings {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub timeout: Option<Duration>,
}

impl EnrichmentSettings {
    /// Merge onto `base`; set fields win.
    pub fn apply_to(&self, mut base: ExplainerConfig) -> ExplainerConfig {
        if let Some(provider) = self.provider {
            base.provider = provider;
        }
        if let Some(model) = &self.model {
            base.model = model.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            base.endpoint = endpoint.clone();
        }
        if let Some(timeout) = self.timeout {
            base.timeout = timeout;
        }
        base
    }
}

/// Parse and validate TOML text. `origin` names the source in errors.
pub fn parse_config(content: &str, origin: &Path) -> Result<Config, ScanError> {
    let raw: RawConfig = toml::from_str(content).map_err(|e| {
        ScanError::Config(format!("failed to parse '{}': {}", origin.display(), e))
    })?;

    let fail_on = raw
        .fail_on
        .as_deref()
        .map(str::parse::<Severity>)
        .transpose()
        .map_err(|e| ScanError::Config(format!("{}: fail_on: {}", origin.display(), e)))?;

    let format = raw
        .format
        .as_deref()
        .map(str::parse::<ReportFormat>)
        .transpose()
        .map_err(|e| ScanError::Config(format!("{}: format: {}", origin.display(), e)))?;

    let provider = raw
        .enrichment
        .provider
        .as_deref()
        .map(str::parse::<Provider>)
        .transpose()
        .map_err(|e| ScanError::Config(format!("{}: enrichment.provider: {}", origin.display(), e)))?;

    if raw.enrichment.timeout_secs == Some(0) {
        return Err(ScanError::Config(format!(
            "{}: enrichment.timeout_secs must be greater than zero",
            origin.display()
        )));
    }

    Ok(Config {
        fail_on,
        format,
        exclude: raw.exclude,
        enrichment: EnrichmentSettings {
            provider,
            model: raw.enrichment.model,
            endpoint: raw.enrichment.endpoint,
            timeout: raw.enrichment.timeout_secs.map(Duration::from_secs),
        },
    })
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ScanError> {
    let content = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&content, path)?;
    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Find a configuration file for `target`: in the directory itself, or
/// next to it when `target` is a file.
pub fn discover_config(target: &Path) -> Option<PathBuf> {
    let dir = if target.is_dir() {
        target
    } else {
        target.parent()?
    };
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}
