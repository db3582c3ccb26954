pub mod analyzer;
pub mod config;
pub mod discovery;
pub mod error;
pub mod explainer;
pub mod rules;
pub mod syntax;

pub use analyzer::gate::GateDecision;
pub use analyzer::report::{Enrichment, Finding, ScanReport, Severity};
pub use analyzer::{scan_file, scan_path, scan_source, ScanOptions};
pub use config::{Config, ReportFormat};
pub use error::ScanError;
pub use explainer::{Explainer, ExplainerConfig, Provider};
pub use syntax::{ParseError, SyntaxTree};
