mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use stonesec_core::analyzer::sarif;
use stonesec_core::config::{self, Config, ReportFormat};
use stonesec_core::rules::REGISTRY;
use stonesec_core::{
    scan_path, Explainer, ExplainerConfig, GateDecision, Provider, ScanError, ScanOptions,
    ScanReport, Severity,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stone-sec",
    version,
    about = "stone-sec - Offline security review for Python code",
    long_about = "Scan Python sources for unsafe deserialization, command and code execution, weak hashing, insecure TLS and other dangerous patterns.\n\nDetection is deterministic and offline; optional enrichment adds explanations from a local model."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review a Python file or directory for security issues
    Review {
        /// Path to a Python file or a directory to scan recursively
        path: PathBuf,

        /// Output format (text, json, sarif)
        #[arg(short, long)]
        format: Option<ReportFormat>,

        /// Exit with status 1 when a finding at or above this severity exists
        #[arg(long, value_name = "SEVERITY")]
        fail_on: Option<Severity>,

        /// Enrich findings with explanations (ollama, template)
        #[arg(long)]
        provider: Option<Provider>,

        /// Model used by the ollama provider
        #[arg(long)]
        model: Option<String>,

        /// Configuration file (defaults to stonesec.toml next to the target)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// List the registered rules
    Rules {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the version
    Version,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Review {
            path,
            format,
            fail_on,
            provider,
            model,
            config,
        } => cmd_review(ReviewArgs {
            path,
            format,
            fail_on,
            provider,
            model,
            config,
        }),
        Commands::Rules { format } => cmd_rules(&format),
        Commands::Version => {
            println!("stone-sec version {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

struct ReviewArgs {
    path: PathBuf,
    format: Option<ReportFormat>,
    fail_on: Option<Severity>,
    provider: Option<Provider>,
    model: Option<String>,
    config: Option<PathBuf>,
}

fn load_config(target: &Path, explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => config::discover_config(target),
    };
    match path {
        Some(path) => config::load_config(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn cmd_review(args: ReviewArgs) -> Result<ExitCode> {
    if !args.path.exists() {
        return Err(ScanError::PathNotFound(args.path).into());
    }

    let config = load_config(&args.path, args.config.as_deref())?;
    let format = args.format.or(config.format).unwrap_or_default();
    let fail_on = args.fail_on.or(config.fail_on);

    let options = ScanOptions {
        exclude: config.exclude.clone(),
    };
    let mut report = scan_path(&args.path, &options)
        .with_context(|| format!("Failed to scan {}", args.path.display()))?;

    let provider = args.provider.or(config.enrichment.provider);
    if let Some(provider) = provider {
        if !report.is_empty() {
            let mut explainer_config = config.enrichment.apply_to(ExplainerConfig::from_env());
            explainer_config.provider = provider;
            if let Some(model) = args.model {
                explainer_config.model = model;
            }
            enrich(&mut report, explainer_config)?;
        }
    }

    render(&report, &args.path, format)?;

    match report.gate(fail_on) {
        GateDecision::Pass => Ok(ExitCode::SUCCESS),
        GateDecision::Fail { worst, threshold } => {
            eprintln!(
                "Failing: highest severity {} meets the --fail-on threshold {}",
                worst.symbol(),
                threshold.symbol()
            );
            Ok(ExitCode::from(1))
        }
    }
}

fn enrich(report: &mut ScanReport, config: ExplainerConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let explainer = Explainer::new(config);
    let enrichments = runtime.block_on(explainer.explain_all(report.findings()));
    report.apply_enrichments(enrichments);
    Ok(())
}

fn render(report: &ScanReport, target: &Path, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Text => display::print_scan_report(report, target),
        ReportFormat::Json => {
            if report.files_discovered == 0 {
                eprintln!("No Python files found.");
            }
            println!("{}", report.to_json()?);
        }
        ReportFormat::Sarif => {
            if report.files_discovered == 0 {
                eprintln!("No Python files found.");
            }
            println!("{}", serde_json::to_string_pretty(&sarif::to_sarif(report))?);
        }
    }
    Ok(())
}

fn cmd_rules(format: &str) -> Result<ExitCode> {
    match format {
        "json" => {
            let rules: Vec<serde_json::Value> = REGISTRY
                .iter()
                .map(|kind| {
                    let meta = kind.meta();
                    serde_json::json!({
                        "rule_id": meta.id,
                        "severity": meta.severity,
                        "title": meta.title,
                        "family": meta.family.label(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
        _ => display::print_rules(),
    }
    Ok(ExitCode::SUCCESS)
}
