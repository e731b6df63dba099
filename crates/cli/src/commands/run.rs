//! Run Command
//!
//! Prepares the reports tree, runs the UI test suite as a child process and
//! builds the shareable report from the records it leaves behind.

use anyhow::{Context, Result};
use clap::Args;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use playrun_common::config::{HEADLESS, REPORTS_DIR, RUN_PARALLEL};
use playrun_common::{ConfigRegistry, ConfigSource, Parallelism};
use playrun_e2e::ArtifactLayout;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::commands::report;
use crate::output::{print_error, print_info, print_report, print_success, print_warning, OutputFormat};

/// Variables that mark a CI execution
const CI_VARS: [&str; 3] = ["JENKINS_HOME", "GITHUB_ACTIONS", "CI"];

/// How long an interrupted test process gets to exit after SIGTERM
const TERM_GRACE: Duration = Duration::from_secs(10);

#[derive(Args)]
pub struct RunArgs {
    /// Worker parallelism: off, auto or a worker count
    #[arg(long, env = "RUN_PARALLEL")]
    pub parallel: Option<String>,

    /// Show the browser window
    #[arg(long, conflicts_with = "headless")]
    pub headed: bool,

    /// Hide the browser window
    #[arg(long)]
    pub headless: bool,

    /// Report heading
    #[arg(long)]
    pub title: Option<String>,

    /// Test command; the configured runner command when empty
    #[arg(last = true)]
    pub command: Vec<String>,
}

enum ChildExit {
    Finished(ExitStatus),
    Interrupted,
}

pub fn is_ci() -> bool {
    CI_VARS
        .iter()
        .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
}

/// CI always runs headless; otherwise an explicit flag beats configuration
pub fn resolve_headless(headed: bool, headless: bool, configured: bool, ci: bool) -> bool {
    if ci {
        return true;
    }
    if headed {
        return false;
    }
    if headless {
        return true;
    }
    configured
}

/// Contents of `environment.properties`
pub fn environment_properties(headless: bool, environment: &str) -> String {
    [
        format!("OS={} {}", std::env::consts::OS, std::env::consts::ARCH),
        format!("Playrun={}", playrun_common::VERSION),
        "Browser=Chromium".to_string(),
        format!("Headed={}", !headless),
        format!("Environment={}", environment),
    ]
    .join("\n")
}

/// SIGTERM the test process, then kill it if it outlives the grace period
async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        info!("Sending SIGTERM to test process {}", pid);
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
    match tokio::time::timeout(TERM_GRACE, child.wait()).await {
        Ok(Ok(status)) => debug!("Test process exited with {}", status),
        _ => {
            warn!("Test process still running, killing it");
            let _ = child.kill().await;
        }
    }
}

/// Returns whether the run passed: the child exited cleanly and no
/// recorded test failed.
pub async fn execute(args: RunArgs, registry: &ConfigRegistry, format: OutputFormat) -> Result<bool> {
    let config = registry.config();
    let parallelism: Parallelism = args
        .parallel
        .as_deref()
        .unwrap_or(&config.runner.parallelism)
        .parse()?;

    let ci = is_ci();
    if ci {
        print_info("CI detected, forcing headless");
    }
    let headless = resolve_headless(args.headed, args.headless, config.browser.headless, ci);

    let layout = ArtifactLayout::new(&config.paths.reports_dir);
    layout.reset_results()?;
    layout.prepare_session()?;

    let command = if args.command.is_empty() {
        config.runner.command.clone()
    } else {
        args.command
    };
    let (program, rest) = command
        .split_first()
        .context("No test command given and none configured")?;

    info!(
        "Running tests: {} (parallel={}, headless={})",
        command.join(" "),
        parallelism,
        headless
    );
    let mut child = Command::new(program)
        .args(rest)
        .env(RUN_PARALLEL, parallelism.to_string())
        .env(HEADLESS, headless.to_string())
        .env(REPORTS_DIR, layout.root())
        .spawn()
        .with_context(|| format!("Failed to start test command '{}'", program))?;

    let exit = tokio::select! {
        status = child.wait() => ChildExit::Finished(status?),
        _ = tokio::signal::ctrl_c() => ChildExit::Interrupted,
    };
    let child_ok = match exit {
        ChildExit::Finished(status) if status.success() => true,
        ChildExit::Finished(status) => {
            print_warning(&format!("Test command exited with {}", status));
            false
        }
        ChildExit::Interrupted => {
            print_warning("Interrupted, stopping test process");
            terminate(&mut child).await;
            false
        }
    };

    let environment = registry
        .get("ENVIRONMENT")
        .unwrap_or_else(|| "QA".to_string());
    let env_file = layout.environment_file();
    if let Err(e) = std::fs::write(&env_file, environment_properties(headless, &environment)) {
        warn!("Failed writing {}: {}", env_file.display(), e);
    }

    let title = args
        .title
        .unwrap_or_else(|| config.runner.report_title.clone());
    let model = report::build(&layout.results_dir(), &layout.report_path(), &title)?;
    print_report(&model, format);

    if model.has_failures() {
        print_error(&format!("{} of {} tests failed", model.failed, model.total));
    } else if child_ok {
        print_success(&format!("Report written to {}", layout.report_path().display()));
    }
    Ok(child_ok && !model.has_failures())
}
