//! Shared engine registry
//!
//! Each engine kind has one slot guarded by its own mutex. The first caller
//! to `acquire` a kind runs the starter while holding the slot lock, so any
//! concurrent caller blocks until that start finishes and then receives the
//! same engine. A failed start is remembered and reported to later callers
//! without another attempt.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use playrun_common::EngineKind;
use tracing::{debug, error, info, warn};

use crate::engine::{BrowserEngine, DatabaseBridge, Engine};
use crate::error::{E2eError, E2eResult};

type Starter<E> = Box<dyn Fn() -> E2eResult<Arc<E>> + Send + Sync>;

enum SlotState<E: ?Sized> {
    Idle,
    Started(Arc<E>),
    Failed(String),
    Released,
}

struct EngineSlot<E: ?Sized> {
    kind: EngineKind,
    starter: Option<Starter<E>>,
    state: Mutex<SlotState<E>>,
    started: Arc<AtomicBool>,
    start_attempts: AtomicUsize,
}

impl<E: ?Sized + Engine> EngineSlot<E> {
    fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            starter: None,
            state: Mutex::new(SlotState::Idle),
            started: Arc::new(AtomicBool::new(false)),
            start_attempts: AtomicUsize::new(0),
        }
    }

    fn handle(&self, engine: Arc<E>) -> EngineHandle<E> {
        EngineHandle {
            kind: self.kind,
            engine,
            started: Arc::clone(&self.started),
        }
    }

    fn acquire(&self) -> E2eResult<EngineHandle<E>> {
        let mut state = self.state.lock();

        match &*state {
            SlotState::Started(engine) => {
                debug!("{} engine already started", self.kind);
                return Ok(self.handle(Arc::clone(engine)));
            }
            SlotState::Failed(reason) => {
                return Err(E2eError::EngineUnavailable {
                    kind: self.kind,
                    reason: format!("earlier start failed: {}", reason),
                });
            }
            SlotState::Released => {
                return Err(E2eError::EngineUnavailable {
                    kind: self.kind,
                    reason: "engines were already released for this session".to_string(),
                });
            }
            SlotState::Idle => {}
        }

        let starter = self
            .starter
            .as_ref()
            .ok_or(E2eError::EngineNotConfigured(self.kind))?;

        info!("Starting {} engine", self.kind);
        self.start_attempts.fetch_add(1, Ordering::SeqCst);

        match starter() {
            Ok(engine) => {
                self.started.store(true, Ordering::SeqCst);
                *state = SlotState::Started(Arc::clone(&engine));
                info!("{} engine started", self.kind);
                Ok(self.handle(engine))
            }
            Err(e) => {
                let reason = e.to_string();
                error!("{} engine failed to start: {}", self.kind, reason);
                *state = SlotState::Failed(reason.clone());
                Err(E2eError::EngineStart {
                    kind: self.kind,
                    reason,
                })
            }
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::Idle) {
            return;
        }
        let previous = std::mem::replace(&mut *state, SlotState::Released);
        if let SlotState::Started(engine) = previous {
            self.started.store(false, Ordering::SeqCst);
            match engine.shutdown() {
                Ok(()) => info!("{} engine shut down", self.kind),
                Err(e) => warn!("{} engine shutdown warning: {}", self.kind, e),
            }
        }
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

/// A started engine shared with the registry
pub struct EngineHandle<E: ?Sized> {
    kind: EngineKind,
    engine: Arc<E>,
    started: Arc<AtomicBool>,
}

impl<E: ?Sized> EngineHandle<E> {
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// False once the registry has released its engines
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }
}

impl<E: ?Sized> Clone for EngineHandle<E> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            engine: Arc::clone(&self.engine),
            started: Arc::clone(&self.started),
        }
    }
}

impl<E: ?Sized> Deref for EngineHandle<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.engine
    }
}

/// A handle of either kind, as returned by [`EngineRegistry::acquire`]
#[derive(Clone)]
pub enum AnyEngine {
    Browser(EngineHandle<dyn BrowserEngine>),
    Database(EngineHandle<dyn DatabaseBridge>),
}

impl AnyEngine {
    pub fn kind(&self) -> EngineKind {
        match self {
            AnyEngine::Browser(h) => h.kind(),
            AnyEngine::Database(h) => h.kind(),
        }
    }

    pub fn is_started(&self) -> bool {
        match self {
            AnyEngine::Browser(h) => h.is_started(),
            AnyEngine::Database(h) => h.is_started(),
        }
    }
}

/// Process-wide owner of the browser and database engines
pub struct EngineRegistry {
    browser: EngineSlot<dyn BrowserEngine>,
    database: EngineSlot<dyn DatabaseBridge>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRegistry {
    /// A registry with no starters configured
    pub fn new() -> Self {
        Self {
            browser: EngineSlot::new(EngineKind::Browser),
            database: EngineSlot::new(EngineKind::Database),
        }
    }

    /// Set how the browser engine is started
    pub fn with_browser<F>(mut self, starter: F) -> Self
    where
        F: Fn() -> E2eResult<Arc<dyn BrowserEngine>> + Send + Sync + 'static,
    {
        self.browser.starter = Some(Box::new(starter));
        self
    }

    /// Set how the database bridge is started
    pub fn with_database<F>(mut self, starter: F) -> Self
    where
        F: Fn() -> E2eResult<Arc<dyn DatabaseBridge>> + Send + Sync + 'static,
    {
        self.database.starter = Some(Box::new(starter));
        self
    }

    pub fn is_configured(&self, kind: EngineKind) -> bool {
        match kind {
            EngineKind::Browser => self.browser.starter.is_some(),
            EngineKind::Database => self.database.starter.is_some(),
        }
    }

    /// Return a started engine of `kind`, starting it on first use
    pub fn acquire(&self, kind: EngineKind) -> E2eResult<AnyEngine> {
        match kind {
            EngineKind::Browser => self.acquire_browser().map(AnyEngine::Browser),
            EngineKind::Database => self.acquire_database().map(AnyEngine::Database),
        }
    }

    pub fn acquire_browser(&self) -> E2eResult<EngineHandle<dyn BrowserEngine>> {
        self.browser.acquire()
    }

    pub fn acquire_database(&self) -> E2eResult<EngineHandle<dyn DatabaseBridge>> {
        self.database.acquire()
    }

    pub fn is_started(&self, kind: EngineKind) -> bool {
        match kind {
            EngineKind::Browser => self.browser.is_started(),
            EngineKind::Database => self.database.is_started(),
        }
    }

    /// How many times the starter for `kind` has been invoked
    pub fn start_attempts(&self, kind: EngineKind) -> usize {
        match kind {
            EngineKind::Browser => self.browser.start_attempts.load(Ordering::SeqCst),
            EngineKind::Database => self.database.start_attempts.load(Ordering::SeqCst),
        }
    }

    /// Shut down every started engine. Safe to call when nothing started,
    /// and safe to call again; shutdown errors are logged only.
    pub fn release_all(&self) {
        self.browser.release();
        self.database.release();
    }
}

impl Drop for EngineRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}
