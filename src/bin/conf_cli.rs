//! Conf Command Line Interface
//!
//! Inspect and syntax-check conf documents.
//!
//! # Usage
//!
//! ```bash
//! # Print the parse tree
//! echo '{ port: 8080 }' | conf_cli parse
//!
//! # Check several documents, machine-readable output
//! conf_cli --format json check -f server.conf -f client.conf
//! ```

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use confbind::{parse_config, ConfigError, Diagnostic};

#[derive(Parser)]
#[command(name = "conf_cli")]
#[command(version)]
#[command(about = "Parse and check conf configuration documents")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: pretty (default) or json
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a document and print its parse tree
    Parse {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Syntax-check one or more documents
    Check {
        /// Input files (reads stdin if none are provided)
        #[arg(short, long)]
        file: Vec<PathBuf>,
    },
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Commands::Parse { file } => cmd_parse(file, cli.format),
        Commands::Check { file } => cmd_check(file, cli.format, cli.quiet),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                let output = serde_json::json!({ "error": format!("{e:#}") });
                println!("{output}");
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_parse(file: Option<PathBuf>, format: OutputFormat) -> Result<bool> {
    let source = read_input(file.as_ref())?;
    let config = parse_config(&source)?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&config).context("JSON serialization failed")?
            );
        }
        OutputFormat::Pretty => {
            println!(
                "{} Parsed {} top-level field(s)",
                "OK".green(),
                config.field_count()
            );
            println!("{config:#?}");
        }
    }

    Ok(true)
}

/// Outcome of checking a single source
struct CheckReport {
    source: String,
    diagnostics: Vec<Diagnostic>,
}

fn cmd_check(files: Vec<PathBuf>, format: OutputFormat, quiet: bool) -> Result<bool> {
    let reports: Vec<CheckReport> = if files.is_empty() {
        vec![check_source("<stdin>", read_input(None))]
    } else {
        files
            .iter()
            .map(|path| check_source(&path.display().to_string(), read_input(Some(path))))
            .collect()
    };

    let valid = reports.iter().all(|r| r.diagnostics.is_empty());

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": valid,
                "sources": reports.iter().map(|r| {
                    serde_json::json!({
                        "source": r.source,
                        "valid": r.diagnostics.is_empty(),
                        "diagnostics": r.diagnostics,
                    })
                }).collect::<Vec<_>>(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("JSON serialization failed")?
            );
        }
        OutputFormat::Pretty => {
            for report in &reports {
                print_report(report, quiet);
            }
        }
    }

    Ok(valid)
}

fn check_source(source: &str, text: Result<String>) -> CheckReport {
    debug!(source, "Checking document");
    let diagnostics = match text {
        Ok(text) => match parse_config(&text) {
            Ok(_) => Vec::new(),
            Err(e) => vec![Diagnostic::from_error(&e)],
        },
        Err(e) => {
            let error = match e.downcast::<io::Error>() {
                Ok(io) => ConfigError::Io(io),
                Err(other) => return unreadable(source, other),
            };
            vec![Diagnostic::from_error(&error)]
        }
    };
    CheckReport {
        source: source.to_string(),
        diagnostics,
    }
}

fn unreadable(source: &str, error: anyhow::Error) -> CheckReport {
    CheckReport {
        source: source.to_string(),
        diagnostics: vec![Diagnostic::error(
            confbind::DiagnosticCode::SourceUnreadable,
            format!("{error:#}"),
        )],
    }
}

fn print_report(report: &CheckReport, quiet: bool) {
    if report.diagnostics.is_empty() {
        if !quiet {
            println!("{} {}", "OK".green().bold(), report.source);
        }
        return;
    }
    for d in &report.diagnostics {
        let location = match &d.span {
            Some(span) => format!("{}:{}:{}", report.source, span.line, span.column),
            None => report.source.clone(),
        };
        eprintln!(
            "{}[{:?}]: {}\n  {} {}",
            "error".red().bold(),
            d.code,
            d.message,
            "-->".blue().bold(),
            location
        );
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("reading stdin")?;
            Ok(buffer)
        }
    }
}
