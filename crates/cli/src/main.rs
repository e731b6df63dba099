//! Playrun CLI - Main Entry Point
//!
//! Runs the UI test suite with per-worker artifact capture and turns the
//! result records into a shareable HTML report.

use anyhow::Context;
use clap::{Parser, Subcommand};
use playrun_common::ConfigRegistry;
use std::path::PathBuf;

mod commands;
mod output;

use commands::{clean, report, run};

/// Playrun - parallel UI test runner and reporter
#[derive(Parser)]
#[command(name = "playrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Harness configuration file
    #[arg(long, default_value = "playrun.toml", env = "PLAYRUN_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the UI test suite and build the report
    Run(run::RunArgs),

    /// Rebuild the HTML report from existing results
    Report(report::ReportArgs),

    /// Remove artifacts of previous runs
    Clean,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let registry = ConfigRegistry::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Run(args) => {
            if !run::execute(args, &registry, cli.format).await? {
                std::process::exit(1);
            }
        }
        Commands::Report(args) => report::execute(args, &registry, cli.format)?,
        Commands::Clean => clean::execute(&registry)?,
        Commands::Version => {
            println!("Playrun CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Harness library v{}", playrun_common::VERSION);
        }
    }

    Ok(())
}
