//! Report Command
//!
//! Rebuilds the shareable HTML report from result records on disk.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use playrun_common::ConfigRegistry;
use playrun_e2e::report::{load_all, summarize, write_report};
use playrun_e2e::ReportModel;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::output::{print_report, print_success, OutputFormat};

#[derive(Args)]
pub struct ReportArgs {
    /// Directory holding `*-result.json` records
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Where to write the HTML report
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Report heading
    #[arg(long)]
    pub title: Option<String>,
}

/// Aggregate every record under `results_dir` and write the report
pub fn build(results_dir: &Path, output: &Path, title: &str) -> Result<ReportModel> {
    let records = load_all(results_dir);
    info!(
        "Aggregating {} result records from {}",
        records.len(),
        results_dir.display()
    );
    let model = summarize(&records, Local::now());
    write_report(&model, title, output)
        .with_context(|| format!("Failed to write report {}", output.display()))?;
    Ok(model)
}

pub fn execute(args: ReportArgs, registry: &ConfigRegistry, format: OutputFormat) -> Result<()> {
    let config = registry.config();
    let results_dir = args.results_dir.unwrap_or_else(|| config.results_dir());
    let output = args.output.unwrap_or_else(|| config.report_path());
    let title = args
        .title
        .unwrap_or_else(|| config.runner.report_title.clone());

    let model = build(&results_dir, &output, &title)?;
    print_report(&model, format);
    print_success(&format!("Report written to {}", output.display()));
    Ok(())
}
