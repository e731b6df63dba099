//! Interfaces to the external engines
//!
//! The harness never drives a browser or a database itself. It talks to them
//! through these traits, so any automation backend (a Playwright driver, a
//! CDP client, an in-memory fake) can be plugged into the registry.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use playrun_common::{EngineKind, Viewport};

use crate::error::E2eResult;

/// Lifecycle shared by every engine held in the registry
pub trait Engine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Stop the engine. Called once, at session end.
    fn shutdown(&self) -> E2eResult<()>;
}

/// Browser-automation engine
pub trait BrowserEngine: Engine {
    /// Open an isolated browsing context
    fn new_context(&self, options: &ContextOptions) -> E2eResult<Box<dyn BrowserContext>>;
}

/// Options for a new browsing context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    pub viewport: Viewport,

    /// Directory the engine records video into; `None` disables recording
    pub record_video_dir: Option<PathBuf>,

    /// Recorded frame size
    pub record_video_size: Viewport,

    /// Delay the engine inserts between page operations
    pub slow_mo: Duration,
}

/// One browsing context; closing it finalizes any video being recorded
pub trait BrowserContext: Send {
    fn new_page(&self) -> E2eResult<Box<dyn Page>>;

    /// Blocking, may take as long as the video encoder needs
    fn close(&self) -> E2eResult<()>;
}

/// A page inside a browsing context
pub trait Page: Send {
    fn goto(&self, url: &str) -> E2eResult<()>;

    fn click(&self, selector: &str) -> E2eResult<()>;

    fn fill(&self, selector: &str, value: &str) -> E2eResult<()>;

    fn text_content(&self, selector: &str) -> E2eResult<String>;

    fn is_visible(&self, selector: &str) -> E2eResult<bool>;

    /// Capture the page as encoded image bytes
    fn screenshot(&self, full_page: bool) -> E2eResult<Vec<u8>>;

    /// Path the engine is recording this page's video to, if recording
    fn video_path(&self) -> Option<PathBuf>;
}

/// One result row, keyed by column name
pub type Row = BTreeMap<String, Option<String>>;

/// Relational database bridge
pub trait DatabaseBridge: Engine {
    /// Run a query with positional `?` parameters
    fn query(&self, sql: &str, params: &[&str]) -> E2eResult<Vec<Row>>;
}
