//! Test session orchestration
//!
//! A [`Session`] owns the reports layout and the shared engine registry for
//! one run. Workers pull test cases from a shared queue and run them one at
//! a time; each test gets its own [`TestResourceScope`], its artifacts are
//! finalized after the scope closes, and its [`ResultRecord`] is written
//! before the next test starts. [`Session::finish`] is the single owner of
//! engine shutdown and report aggregation.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use parking_lot::Mutex;
use playrun_common::{EngineKind, HarnessConfig, Parallelism, Status};
use tracing::dispatcher::DefaultGuard;
use tracing::{debug, error, info, info_span, warn};
use walkdir::WalkDir;

use crate::capture::{attach_screenshot, capture_screenshot, finalize_video, ArtifactRecord, VideoOutcome};
use crate::engine::{DatabaseBridge, Page};
use crate::error::{E2eError, E2eResult};
use crate::identity::TestIdentity;
use crate::logging::worker_dispatch;
use crate::namespace::{worker_id_from_env, ArtifactLayout, WorkerContext};
use crate::record::{ResultRecord, StatusDetails, StepRecord};
use crate::registry::{EngineHandle, EngineRegistry};
use crate::report::{load_all, summarize as summarize_report, write_report, ReportModel};
use crate::scope::{ScopeOptions, TestResourceScope};
use crate::summary::{summarize, RawFailure};

/// Body of a test, run with exclusive access to its context
pub type TestBody = Box<dyn FnOnce(&mut TestContext<'_>) -> E2eResult<()> + Send>;

/// A test waiting to run
pub struct TestCase {
    pub identity: TestIdentity,
    body: TestBody,
}

impl TestCase {
    pub fn new<F>(identity: TestIdentity, body: F) -> Self
    where
        F: FnOnce(&mut TestContext<'_>) -> E2eResult<()> + Send + 'static,
    {
        Self {
            identity,
            body: Box::new(body),
        }
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// What a test body can reach while it runs
pub struct TestContext<'a> {
    identity: &'a TestIdentity,
    worker: &'a WorkerContext,
    scope: &'a TestResourceScope,
    registry: &'a EngineRegistry,
    database: Option<EngineHandle<dyn DatabaseBridge>>,
    steps: Vec<StepRecord>,
    fatal: Option<E2eError>,
}

impl<'a> TestContext<'a> {
    fn new(
        identity: &'a TestIdentity,
        worker: &'a WorkerContext,
        scope: &'a TestResourceScope,
        registry: &'a EngineRegistry,
    ) -> Self {
        Self {
            identity,
            worker,
            scope,
            registry,
            database: None,
            steps: Vec::new(),
            fatal: None,
        }
    }

    pub fn identity(&self) -> &TestIdentity {
        self.identity
    }

    pub fn worker(&self) -> &WorkerContext {
        self.worker
    }

    pub fn page(&self) -> E2eResult<&'a dyn Page> {
        self.scope.page()
    }

    /// The shared database bridge, started on first use. A start failure
    /// fails this test and stops the run.
    pub fn database(&mut self) -> E2eResult<&dyn DatabaseBridge> {
        if self.database.is_none() {
            match self.registry.acquire_database() {
                Ok(handle) => self.database = Some(handle),
                Err(e) if e.is_fatal() => {
                    let reason = e.to_string();
                    self.fatal = Some(e);
                    return Err(E2eError::EngineUnavailable {
                        kind: EngineKind::Database,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        self.database
            .as_deref()
            .ok_or(E2eError::EngineNotConfigured(EngineKind::Database))
    }

    /// Run `f` as a named step. Steps opened inside `f` nest under it.
    pub fn step<T, F>(&mut self, name: &str, f: F) -> E2eResult<T>
    where
        F: FnOnce(&mut Self) -> E2eResult<T>,
    {
        info!("Step: {}", name);
        let start = playrun_common::now_millis();
        let outer = std::mem::take(&mut self.steps);

        let result = f(self);

        let inner = std::mem::replace(&mut self.steps, outer);
        let status = match &result {
            Ok(_) => Status::Passed,
            Err(E2eError::Skipped(_)) => Status::Skipped,
            Err(_) => Status::Failed,
        };
        self.steps.push(StepRecord {
            name: name.to_string(),
            status: Some(status.as_str().to_string()),
            start: Some(start),
            stop: Some(playrun_common::now_millis()),
            steps: inner,
        });
        result
    }
}

/// Result of one test, as seen by the caller
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub test_id: String,
    pub node_id: String,
    pub worker_id: String,
    pub status: Status,
    /// One-line failure summary
    pub summary: Option<String>,
    pub video: VideoOutcome,
    pub screenshot_captured: bool,
    pub record_path: Option<PathBuf>,
    pub duration_ms: u128,
}

/// Runs tests sequentially inside one artifact namespace
pub struct Worker {
    context: WorkerContext,
    config: Arc<HarnessConfig>,
    registry: Arc<EngineRegistry>,
}

impl Worker {
    pub fn id(&self) -> &str {
        self.context.worker_id()
    }

    pub fn context(&self) -> &WorkerContext {
        &self.context
    }

    /// Run one test end to end.
    ///
    /// Only an engine failure is returned as `Err`; everything the test
    /// itself does wrong ends up in the outcome and the written record.
    pub fn run_test(&self, case: TestCase) -> E2eResult<TestOutcome> {
        let TestCase { identity, body } = case;
        let span = info_span!("test", test_id = %identity.test_id);
        let _entered = span.enter();
        let timer = Instant::now();
        info!("TEST START: {} (worker={})", identity.test_id, self.id());

        let browser = self.registry.acquire_browser()?;
        let mut record = ResultRecord::new(&identity);
        let options = ScopeOptions {
            viewport: self.config.browser.viewport,
            record_video: true,
            slow_mo: self.config.browser.slow_mo(),
        };

        let mut scope = match TestResourceScope::open(&*browser, &self.context, &identity, &options) {
            Ok(scope) => scope,
            Err(e) => {
                error!("Could not open browser context for {}: {}", identity.test_id, e);
                let trace = e.to_string();
                let summary = summarize(&RawFailure::from_trace(trace.as_str()));
                record.finish(Status::Failed, Some(details(&summary, trace)));
                return Ok(TestOutcome {
                    test_id: identity.test_id.clone(),
                    node_id: identity.node_id.clone(),
                    worker_id: self.id().to_string(),
                    status: Status::Failed,
                    summary: Some(summary),
                    video: VideoOutcome::NotRecorded,
                    screenshot_captured: false,
                    record_path: self.write_record(&record),
                    duration_ms: timer.elapsed().as_millis(),
                });
            }
        };

        let (status, failure, steps, fatal) = {
            let mut ctx = TestContext::new(&identity, &self.context, &scope, &self.registry);
            let result = panic::catch_unwind(AssertUnwindSafe(|| body(&mut ctx)));

            let (status, failure) = match result {
                Ok(Ok(())) => (Status::Passed, None),
                Ok(Err(E2eError::Skipped(reason))) => {
                    info!("Skipped: {}", reason);
                    (Status::Skipped, Some((reason.clone(), reason)))
                }
                Ok(Err(e)) => {
                    let trace = e.to_string();
                    let summary = summarize(&RawFailure::from_trace(trace.as_str()));
                    (Status::Failed, Some((summary, trace)))
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    let trace = format!("thread '{}' panicked: {}\n  at {}", self.id(), message, identity.node_id);
                    let summary = summarize(&RawFailure::from_trace(trace.as_str()));
                    (Status::Failed, Some((summary, trace)))
                }
            };
            (status, failure, std::mem::take(&mut ctx.steps), ctx.fatal.take())
        };

        let passed = !status.is_failed();
        let capture = &self.config.capture;

        let mut screenshot = None;
        if capture.screenshot.keeps(passed) {
            let mut shot = capture_screenshot(&scope);
            if !shot.is_empty() {
                if capture.persist_screenshots {
                    if let Err(e) = shot.persist(self.context.screenshot_dir(), &identity.test_id) {
                        warn!("Could not persist screenshot for {}: {}", identity.test_id, e);
                    }
                } else {
                    let dir = self.context.results_dir();
                    attach_screenshot(&mut record, dir, &identity.test_id, &shot);
                }
                screenshot = Some(shot);
            }
        }

        if let Err(e) = scope.close() {
            warn!("Could not close context for {}: {}", identity.test_id, e);
        }
        let video = finalize_video(&scope, capture, passed);

        let artifacts = ArtifactRecord {
            test_id: identity.test_id.clone(),
            screenshot,
            video,
        };
        record.attachments.extend(artifacts.attachments());
        record.steps = steps;

        let summary = failure.as_ref().filter(|_| status.is_failed()).map(|(s, _)| s.clone());
        record.finish(status, failure.map(|(message, trace)| details(&message, trace)));
        let record_path = self.write_record(&record);

        info!("TEST END: {} - {}", identity.test_id, status.as_str().to_uppercase());

        if let Some(e) = fatal {
            error!("Engine failure during {}: {}", identity.test_id, e);
            return Err(e);
        }

        Ok(TestOutcome {
            test_id: identity.test_id,
            node_id: identity.node_id,
            worker_id: self.id().to_string(),
            status,
            summary,
            screenshot_captured: artifacts.screenshot.is_some(),
            video: artifacts.video,
            record_path,
            duration_ms: timer.elapsed().as_millis(),
        })
    }

    fn write_record(&self, record: &ResultRecord) -> Option<PathBuf> {
        match record.write(self.context.results_dir()) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not write result record for {}: {}", record.name, e);
                None
            }
        }
    }
}

fn details(message: &str, trace: String) -> StatusDetails {
    StatusDetails {
        message: Some(message.to_string()),
        trace: Some(trace),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "test body panicked".to_string()
    }
}

/// One run of the harness
pub struct Session {
    config: Arc<HarnessConfig>,
    registry: Arc<EngineRegistry>,
    layout: ArtifactLayout,
    worker_logs: bool,
    verbose: bool,
}

impl Session {
    /// Clean the reports tree and get ready to run tests
    pub fn begin(config: Arc<HarnessConfig>, registry: Arc<EngineRegistry>) -> E2eResult<Self> {
        let layout = ArtifactLayout::new(&config.paths.reports_dir);
        layout.prepare_session()?;
        std::fs::create_dir_all(layout.results_dir())?;

        info!(
            "Session started (reports: {}, video: {}, screenshot: {})",
            layout.root().display(),
            config.capture.video,
            config.capture.screenshot
        );

        Ok(Self {
            config,
            registry,
            layout,
            worker_logs: true,
            verbose: false,
        })
    }

    /// Whether workers also log to their own execution log file
    pub fn with_worker_logs(mut self, enabled: bool, verbose: bool) -> Self {
        self.worker_logs = enabled;
        self.verbose = verbose;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    /// A worker with its directories in place
    pub fn worker(&self, worker_id: &str) -> E2eResult<Worker> {
        let context = self.layout.worker(worker_id);
        context.ensure()?;
        Ok(Worker {
            context,
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
        })
    }

    fn log_guard(&self, worker: &Worker) -> Option<DefaultGuard> {
        if !self.worker_logs {
            return None;
        }
        match worker_dispatch(worker.context(), self.verbose) {
            Ok(dispatch) => Some(tracing::dispatcher::set_default(&dispatch)),
            Err(e) => {
                warn!("Worker log for {} unavailable: {}", worker.id(), e);
                None
            }
        }
    }

    /// Run every case. `Parallelism::Off` runs them in order as the worker
    /// named by `PLAYRUN_WORKER`, `master` when unset;
    /// otherwise workers `gw0..gwN` share a queue. An engine failure stops
    /// the run and is returned once all workers have stopped.
    pub fn run(&self, cases: Vec<TestCase>, parallelism: Parallelism) -> E2eResult<Vec<TestOutcome>> {
        let total = cases.len();
        let Some(requested) = parallelism.worker_count() else {
            return self.run_serial(cases);
        };
        let workers = requested.clamp(1, total.max(1));
        info!("Running {} tests on {} workers", total, workers);

        let pool = (0..workers)
            .map(|i| self.worker(&format!("gw{}", i)))
            .collect::<E2eResult<Vec<_>>>()?;

        let queue = Mutex::new(cases.into_iter().enumerate().collect::<VecDeque<_>>());
        let results = Mutex::new(Vec::with_capacity(total));
        let abort = AtomicBool::new(false);
        let fatal: Mutex<Option<E2eError>> = Mutex::new(None);

        std::thread::scope(|s| {
            for worker in &pool {
                let (queue, results, abort, fatal) = (&queue, &results, &abort, &fatal);
                let spawned = std::thread::Builder::new()
                    .name(worker.id().to_string())
                    .spawn_scoped(s, move || {
                        let _log = self.log_guard(worker);
                        let span = info_span!("worker", id = worker.id());
                        let _entered = span.enter();

                        while !abort.load(Ordering::SeqCst) {
                            let next = queue.lock().pop_front();
                            let Some((index, case)) = next else {
                                break;
                            };
                            match worker.run_test(case) {
                                Ok(outcome) => results.lock().push((index, outcome)),
                                Err(e) => {
                                    error!("Stopping run: {}", e);
                                    abort.store(true, Ordering::SeqCst);
                                    let mut slot = fatal.lock();
                                    if slot.is_none() {
                                        *slot = Some(e);
                                    }
                                    break;
                                }
                            }
                        }
                        debug!("Worker {} done", worker.id());
                    });

                if let Err(e) = spawned {
                    abort.store(true, Ordering::SeqCst);
                    let mut slot = fatal.lock();
                    if slot.is_none() {
                        *slot = Some(E2eError::Io(e));
                    }
                }
            }
        });

        if let Some(e) = fatal.into_inner() {
            return Err(e);
        }

        let mut results = results.into_inner();
        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, outcome)| outcome).collect())
    }

    fn run_serial(&self, cases: Vec<TestCase>) -> E2eResult<Vec<TestOutcome>> {
        info!("Running {} tests serially", cases.len());
        let worker = self.worker(&worker_id_from_env())?;
        let _log = self.log_guard(&worker);

        let mut outcomes = Vec::with_capacity(cases.len());
        for case in cases {
            outcomes.push(worker.run_test(case)?);
        }
        Ok(outcomes)
    }

    /// End the session: shut engines down, aggregate every record and write
    /// the shareable report. Uses the configured title when `title` is `None`.
    pub fn finish(self, title: Option<&str>) -> E2eResult<ReportModel> {
        self.registry.release_all();
        self.log_video_summary();

        let records = load_all(&self.layout.results_dir());
        let model = summarize_report(&records, Local::now());
        let title = title.unwrap_or(&self.config.runner.report_title);
        write_report(&model, title, &self.layout.report_path())?;

        info!(
            total = model.total,
            passed = model.passed,
            failed = model.failed,
            skipped = model.skipped,
            "Session finished"
        );
        Ok(model)
    }

    fn log_video_summary(&self) {
        let root = self.layout.videos_root();
        if !root.exists() {
            info!("No video directory found at {}", root.display());
            return;
        }

        let videos: Vec<_> = WalkDir::new(&root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .collect();
        let workers = WalkDir::new(&root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .count();

        info!("{} videos across {} worker folders in {}", videos.len(), workers, root.display());
        for video in &videos {
            debug!("  {}", video.path().display());
        }
    }
}
