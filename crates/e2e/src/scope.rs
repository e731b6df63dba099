//! Per-test browser resources

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use playrun_common::Viewport;
use tracing::{debug, info, warn};

use crate::engine::{BrowserContext, BrowserEngine, ContextOptions, Page};
use crate::error::{E2eError, E2eResult};
use crate::identity::TestIdentity;
use crate::namespace::WorkerContext;

/// How a scope's browsing context is configured
#[derive(Debug, Clone)]
pub struct ScopeOptions {
    pub viewport: Viewport,

    /// Record video into the worker's video dir
    pub record_video: bool,

    pub slow_mo: Duration,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            record_video: true,
            slow_mo: Duration::ZERO,
        }
    }
}

/// The live context and page owned by exactly one running test.
///
/// Closed explicitly before the outcome is finalized, and again (as a no-op)
/// on drop, so every exit path releases the browsing context.
pub struct TestResourceScope {
    test_id: String,
    worker_id: String,
    video_dir: PathBuf,
    context: Option<Box<dyn BrowserContext>>,
    page: Option<Box<dyn Page>>,
    started_at: DateTime<Utc>,
    recorded_video: Option<PathBuf>,
}

impl TestResourceScope {
    /// Open a fresh context and page for `identity`
    pub fn open(
        engine: &dyn BrowserEngine,
        worker: &WorkerContext,
        identity: &TestIdentity,
        options: &ScopeOptions,
    ) -> E2eResult<Self> {
        let context_options = ContextOptions {
            viewport: options.viewport,
            record_video_dir: options
                .record_video
                .then(|| worker.video_dir().to_path_buf()),
            record_video_size: options.viewport,
            slow_mo: options.slow_mo,
        };

        let context = engine.new_context(&context_options)?;
        let page = match context.new_page() {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = context.close() {
                    warn!(
                        "Could not close half-open context for {}: {}",
                        identity.test_id, close_err
                    );
                }
                return Err(e);
            }
        };

        debug!(test_id = %identity.test_id, worker = worker.worker_id(), "Opened test scope");

        Ok(Self {
            test_id: identity.test_id.clone(),
            worker_id: worker.worker_id().to_string(),
            video_dir: worker.video_dir().to_path_buf(),
            context: Some(context),
            page: Some(page),
            started_at: Utc::now(),
            recorded_video: None,
        })
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Where finalized videos for this scope belong
    pub fn video_dir(&self) -> &Path {
        &self.video_dir
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_open(&self) -> bool {
        self.context.is_some()
    }

    /// The live page; an error once the scope is closed
    pub fn page(&self) -> E2eResult<&dyn Page> {
        self.page
            .as_deref()
            .ok_or_else(|| E2eError::ScopeClosed(self.test_id.clone()))
    }

    /// Raw recording reported by the engine, known once the scope is closed
    pub fn recorded_video(&self) -> Option<&Path> {
        self.recorded_video.as_deref()
    }

    /// Close the context, which finalizes the recording. Blocks for as long
    /// as the engine needs. Calling it again is a no-op.
    pub fn close(&mut self) -> E2eResult<()> {
        if let Some(page) = self.page.take() {
            self.recorded_video = page.video_path();
        }

        let Some(context) = self.context.take() else {
            return Ok(());
        };

        context.close()?;
        info!("Closed browser context for: {}", self.test_id);
        Ok(())
    }
}

impl Drop for TestResourceScope {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                warn!("Could not close context for {}: {}", self.test_id, e);
            }
        }
    }
}

impl std::fmt::Debug for TestResourceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestResourceScope")
            .field("test_id", &self.test_id)
            .field("worker_id", &self.worker_id)
            .field("open", &self.is_open())
            .field("started_at", &self.started_at)
            .field("recorded_video", &self.recorded_video)
            .finish()
    }
}
