//! Per-worker execution logs
//!
//! Each worker writes `logs/test_execution_log_<worker>.log` alongside the
//! console output. Old logs are removed once per session by
//! `ArtifactLayout::prepare_session`; within a session the file is appended to.

use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use tracing::Dispatch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{E2eError, E2eResult};
use crate::namespace::WorkerContext;

fn filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn open_log(worker: &WorkerContext) -> E2eResult<File> {
    let path = worker.log_file();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn dispatch_to(file: File, verbose: bool) -> Dispatch {
    let subscriber = tracing_subscriber::registry()
        .with(filter(verbose))
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(Mutex::new(file)),
        );
    Dispatch::new(subscriber)
}

/// A subscriber writing to the console and appending to the worker's log
/// file. `ArtifactLayout::prepare_session` clears old logs once per session.
pub fn worker_dispatch(worker: &WorkerContext, verbose: bool) -> E2eResult<Dispatch> {
    Ok(dispatch_to(open_log(worker)?, verbose))
}

/// Install the worker subscriber as the process default. Fails with
/// [`E2eError::Logging`] if another subscriber is already installed; the log
/// file is only ever appended to, so a live subscriber keeps its output.
pub fn init_worker_logging(worker: &WorkerContext, verbose: bool) -> E2eResult<()> {
    let dispatch = dispatch_to(open_log(worker)?, verbose);
    tracing::dispatcher::set_global_default(dispatch)
        .map_err(|e| E2eError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::ArtifactLayout;

    #[test]
    fn test_worker_log_appends_across_dispatches() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ArtifactLayout::new(dir.path()).worker("gw2");

        for line in ["first run of gw2", "second run of gw2"] {
            let dispatch = worker_dispatch(&worker, true).unwrap();
            tracing::dispatcher::with_default(&dispatch, || {
                tracing::info!("{}", line);
            });
        }

        let content = std::fs::read_to_string(worker.log_file()).unwrap();
        assert!(content.contains("first run of gw2"));
        assert!(content.contains("second run of gw2"));
    }

    #[test]
    fn test_prepare_session_clears_worker_log() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let worker = layout.worker("gw0");
        std::fs::create_dir_all(worker.log_file().parent().unwrap()).unwrap();
        std::fs::write(worker.log_file(), "previous session\n").unwrap();

        layout.prepare_session().unwrap();
        let dispatch = worker_dispatch(&worker, false).unwrap();
        tracing::dispatcher::with_default(&dispatch, || tracing::info!("new session"));

        let content = std::fs::read_to_string(worker.log_file()).unwrap();
        assert!(!content.contains("previous session"));
        assert!(content.contains("new session"));
    }
}
