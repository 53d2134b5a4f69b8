//! themecheck CLI tool.
//!
//! Usage:
//! ```bash
//! themecheck check [OPTIONS] [PATH]
//! themecheck list-checks
//! themecheck init
//! ```
//!
//! Exit codes: 0 when no offense reaches the fail level, 1 when one does or
//! the run cannot start, 2 when a check or the engine hits a bug.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use themecheck_core::{EngineError, Severity};
use tracing_subscriber::EnvFilter;

mod commands;
mod config_resolver;

/// Static analyzer for Liquid themes
#[derive(Parser)]
#[command(name = "themecheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "THEMECHECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a theme
    Check {
        /// Theme root (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Only run specific checks, by name or code (comma-separated)
        #[arg(long)]
        checks: Option<String>,

        /// Apply the corrections of correctable offenses
        #[arg(short, long)]
        auto_correct: bool,

        /// Lowest severity that fails the run: error, suggestion or style
        #[arg(long, value_parser = parse_severity)]
        fail_level: Option<Severity>,

        /// Exclude patterns (can be specified multiple times)
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// List available checks
    ListChecks,

    /// Initialize configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

/// Output format for lint results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output with source excerpts.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// One-line-per-offense compact format.
    Compact,
}

fn parse_severity(value: &str) -> Result<Severity, String> {
    Severity::from_name(value)
        .ok_or_else(|| format!("unknown severity '{value}', expected error, suggestion or style"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            if let Some(report) = error
                .downcast_ref::<EngineError>()
                .and_then(EngineError::bug_report)
            {
                eprintln!("{}", report.render());
                return ExitCode::from(2);
            }
            eprintln!("Error: {error:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Check {
            path,
            format,
            checks,
            auto_correct,
            fail_level,
            exclude,
        } => {
            let config = config_resolver::resolve(&path, cli.config.as_deref());
            let options = commands::check::CheckOptions {
                path,
                format,
                checks,
                auto_correct,
                fail_level,
                exclude,
            };
            commands::check::run(&options, &config)
        }
        Commands::ListChecks => {
            commands::list_checks::run();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { force } => {
            commands::init::run(Path::new("."), force)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
