//! Reports directory layout and per-worker artifact namespaces
//!
//! ```text
//! reports/
//!   videos/<worker>/<test_id>.webm
//!   screenshots/<worker>/
//!   logs/test_execution_log_<worker>.log
//!   test-results/<uuid>-result.json
//!   shareable_report.html
//! ```

use std::path::{Path, PathBuf};

use playrun_common::{SERIAL_WORKER, WORKER_ENV};
use tracing::{debug, info, warn};

use crate::error::E2eResult;

/// The session-wide reports tree
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn videos_root(&self) -> PathBuf {
        self.root.join("videos")
    }

    pub fn screenshots_root(&self) -> PathBuf {
        self.root.join("screenshots")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("test-results")
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join("shareable_report.html")
    }

    pub fn environment_file(&self) -> PathBuf {
        self.results_dir().join("environment.properties")
    }

    /// Namespace for one worker
    pub fn worker(&self, worker_id: &str) -> WorkerContext {
        let worker_id = sanitize_worker_id(worker_id);
        WorkerContext {
            video_dir: self.videos_root().join(&worker_id),
            screenshot_dir: self.screenshots_root().join(&worker_id),
            log_file: self
                .logs_dir()
                .join(format!("test_execution_log_{}.log", worker_id)),
            results_dir: self.results_dir(),
            worker_id,
        }
    }

    /// Remove artifacts left by a previous run: videos and screenshots are
    /// recreated empty, old execution logs are deleted. Scopes that a killed
    /// test could not close are cleaned up here.
    pub fn prepare_session(&self) -> E2eResult<()> {
        for folder in [self.videos_root(), self.screenshots_root()] {
            if folder.exists() {
                info!("Cleaning up old {} before test run", folder.display());
                if let Err(e) = std::fs::remove_dir_all(&folder) {
                    warn!("Could not remove {}: {}", folder.display(), e);
                }
            }
            std::fs::create_dir_all(&folder)?;
        }

        let logs_dir = self.logs_dir();
        if logs_dir.exists() {
            for entry in std::fs::read_dir(&logs_dir)? {
                let path = entry?.path();
                let is_run_log = path
                    .file_name()
                    .map(|n| n.to_string_lossy())
                    .map(|n| n.starts_with("test_execution_log") && n.ends_with(".log"))
                    .unwrap_or(false);
                if is_run_log {
                    match std::fs::remove_file(&path) {
                        Ok(()) => debug!("Removed old log: {}", path.display()),
                        Err(e) => warn!("Could not remove log {}: {}", path.display(), e),
                    }
                }
            }
        }
        std::fs::create_dir_all(&logs_dir)?;
        Ok(())
    }

    /// Clear previous result records
    pub fn reset_results(&self) -> E2eResult<()> {
        let results = self.results_dir();
        if results.exists() {
            info!("Removing old results: {}", results.display());
            std::fs::remove_dir_all(&results)?;
        }
        std::fs::create_dir_all(&results)?;
        Ok(())
    }
}

/// Artifact locations owned by a single worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerContext {
    worker_id: String,
    video_dir: PathBuf,
    screenshot_dir: PathBuf,
    log_file: PathBuf,
    results_dir: PathBuf,
}

impl WorkerContext {
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn is_serial(&self) -> bool {
        self.worker_id == SERIAL_WORKER
    }

    pub fn video_dir(&self) -> &Path {
        &self.video_dir
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Shared by all workers; each record has a unique file name
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Create the worker's directories. Safe to repeat.
    pub fn ensure(&self) -> E2eResult<()> {
        std::fs::create_dir_all(&self.video_dir)?;
        std::fs::create_dir_all(&self.screenshot_dir)?;
        std::fs::create_dir_all(&self.results_dir)?;
        if let Some(parent) = self.log_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Worker label from the environment, `master` when unset
pub fn worker_id_from_env() -> String {
    worker_id_or_serial(std::env::var(WORKER_ENV).ok().as_deref())
}

fn worker_id_or_serial(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(id) if !id.is_empty() => sanitize_worker_id(id),
        _ => SERIAL_WORKER.to_string(),
    }
}

/// Keep worker ids usable as a single path component
fn sanitize_worker_id(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        SERIAL_WORKER.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_paths_are_scoped() {
        let layout = ArtifactLayout::new("reports");
        let gw0 = layout.worker("gw0");
        let gw1 = layout.worker("gw1");

        assert_eq!(gw0.video_dir(), Path::new("reports/videos/gw0"));
        assert_eq!(gw0.screenshot_dir(), Path::new("reports/screenshots/gw0"));
        assert_eq!(
            gw0.log_file(),
            Path::new("reports/logs/test_execution_log_gw0.log")
        );
        assert_ne!(gw0.video_dir(), gw1.video_dir());
        assert_eq!(gw0.results_dir(), gw1.results_dir());
    }

    #[test]
    fn test_sanitize_worker_id() {
        assert_eq!(sanitize_worker_id("gw3"), "gw3");
        assert_eq!(sanitize_worker_id("../evil"), "___evil");
        assert_eq!(sanitize_worker_id("  "), "master");
    }

    #[test]
    fn test_worker_id_falls_back_to_master() {
        assert_eq!(worker_id_or_serial(Some("gw2")), "gw2");
        assert_eq!(worker_id_or_serial(Some(" gw/1 ")), "gw_1");
        assert_eq!(worker_id_or_serial(Some("")), "master");
        assert_eq!(worker_id_or_serial(None), "master");
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ArtifactLayout::new(dir.path()).worker("master");
        worker.ensure().unwrap();
        worker.ensure().unwrap();
        assert!(worker.video_dir().is_dir());
        assert!(worker.is_serial());
    }

    #[test]
    fn test_prepare_session_removes_stale_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let worker = layout.worker("gw0");
        worker.ensure().unwrap();
        std::fs::write(worker.video_dir().join("stale.webm"), b"old").unwrap();
        std::fs::write(layout.logs_dir().join("test_execution_log_gw0.log"), b"old").unwrap();
        std::fs::write(layout.logs_dir().join("keep.txt"), b"keep").unwrap();

        layout.prepare_session().unwrap();

        assert!(layout.videos_root().is_dir());
        assert!(!worker.video_dir().exists());
        assert!(!layout.logs_dir().join("test_execution_log_gw0.log").exists());
        assert!(layout.logs_dir().join("keep.txt").exists());
    }
}
