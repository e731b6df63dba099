//! In-memory engines for driving the harness without a real browser

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use playrun_common::{EngineKind, HarnessConfig};
use playrun_e2e::engine::{BrowserContext, BrowserEngine, ContextOptions, DatabaseBridge, Engine, Page, Row};
use playrun_e2e::{E2eError, E2eResult, EngineRegistry};

static RAW_VIDEO_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Counters shared between a fake browser and everything it hands out
#[derive(Debug, Default)]
pub struct BrowserStats {
    pub contexts_opened: AtomicUsize,
    pub contexts_closed: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub screenshots: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct FakeBrowserOptions {
    /// Size of the video each context writes on close
    pub video_bytes: usize,
    pub screenshot: Option<Vec<u8>>,
    pub fail_new_page: bool,
    pub texts: HashMap<String, String>,
    pub visible: Vec<String>,
}

impl Default for FakeBrowserOptions {
    fn default() -> Self {
        let mut texts = HashMap::new();
        texts.insert("h1".to_string(), "Products".to_string());
        Self {
            video_bytes: 4096,
            screenshot: Some(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a]),
            fail_new_page: false,
            texts,
            visible: vec!["#cart".to_string()],
        }
    }
}

pub struct FakeBrowser {
    pub options: FakeBrowserOptions,
    pub stats: Arc<BrowserStats>,
    /// Options of every context opened so far
    pub contexts: Mutex<Vec<ContextOptions>>,
}

impl FakeBrowser {
    pub fn new() -> Arc<Self> {
        Self::with_options(FakeBrowserOptions::default())
    }

    pub fn with_options(options: FakeBrowserOptions) -> Arc<Self> {
        Arc::new(Self {
            options,
            stats: Arc::new(BrowserStats::default()),
            contexts: Mutex::new(Vec::new()),
        })
    }
}

impl Engine for FakeBrowser {
    fn kind(&self) -> EngineKind {
        EngineKind::Browser
    }

    fn shutdown(&self) -> E2eResult<()> {
        self.stats.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl BrowserEngine for FakeBrowser {
    fn new_context(&self, options: &ContextOptions) -> E2eResult<Box<dyn BrowserContext>> {
        self.stats.contexts_opened.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().push(options.clone());
        Ok(Box::new(FakeContext {
            video_dir: options.record_video_dir.clone(),
            options: self.options.clone(),
            stats: Arc::clone(&self.stats),
            videos: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
        }))
    }
}

struct FakeContext {
    video_dir: Option<PathBuf>,
    options: FakeBrowserOptions,
    stats: Arc<BrowserStats>,
    videos: Mutex<Vec<PathBuf>>,
    closed: Mutex<bool>,
}

impl BrowserContext for FakeContext {
    fn new_page(&self) -> E2eResult<Box<dyn Page>> {
        if self.options.fail_new_page {
            return Err(E2eError::Browser("Target page, context or browser has been closed".into()));
        }
        let video = self.video_dir.as_ref().map(|dir| {
            let seq = RAW_VIDEO_SEQ.fetch_add(1, Ordering::SeqCst);
            dir.join(format!("raw-{:06}.webm", seq))
        });
        if let Some(path) = &video {
            self.videos.lock().push(path.clone());
        }
        Ok(Box::new(FakePage {
            video,
            options: self.options.clone(),
            stats: Arc::clone(&self.stats),
        }))
    }

    fn close(&self) -> E2eResult<()> {
        let mut closed = self.closed.lock();
        if *closed {
            return Ok(());
        }
        *closed = true;
        for path in self.videos.lock().iter() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, vec![0x1a; self.options.video_bytes])?;
        }
        self.stats.contexts_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePage {
    video: Option<PathBuf>,
    options: FakeBrowserOptions,
    stats: Arc<BrowserStats>,
}

impl Page for FakePage {
    fn goto(&self, _url: &str) -> E2eResult<()> {
        Ok(())
    }

    fn click(&self, selector: &str) -> E2eResult<()> {
        if selector.contains("missing") {
            return Err(E2eError::Timeout(format!(
                "Timeout 30000ms exceeded.\n  - waiting for locator(\"{}\")",
                selector
            )));
        }
        Ok(())
    }

    fn fill(&self, _selector: &str, _value: &str) -> E2eResult<()> {
        Ok(())
    }

    fn text_content(&self, selector: &str) -> E2eResult<String> {
        self.options
            .texts
            .get(selector)
            .cloned()
            .ok_or_else(|| E2eError::Browser(format!("no element for {}", selector)))
    }

    fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        Ok(self.options.visible.iter().any(|s| s == selector))
    }

    fn screenshot(&self, _full_page: bool) -> E2eResult<Vec<u8>> {
        self.stats.screenshots.fetch_add(1, Ordering::SeqCst);
        self.options
            .screenshot
            .clone()
            .ok_or_else(|| E2eError::Browser("screenshot failed".into()))
    }

    fn video_path(&self) -> Option<PathBuf> {
        self.video.clone()
    }
}

/// Database bridge answering every query with one canned row
#[derive(Default)]
pub struct FakeDatabase {
    pub queries: Mutex<Vec<String>>,
    pub shutdowns: AtomicUsize,
}

impl Engine for FakeDatabase {
    fn kind(&self) -> EngineKind {
        EngineKind::Database
    }

    fn shutdown(&self) -> E2eResult<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl DatabaseBridge for FakeDatabase {
    fn query(&self, sql: &str, params: &[&str]) -> E2eResult<Vec<Row>> {
        self.queries.lock().push(sql.to_string());
        let mut row = BTreeMap::new();
        row.insert("username".to_string(), params.first().map(|p| p.to_string()));
        row.insert("locked".to_string(), None);
        Ok(vec![row])
    }
}

/// Registry whose browser starter hands out `browser`
pub fn registry_with(browser: Arc<FakeBrowser>) -> EngineRegistry {
    EngineRegistry::new().with_browser(move || {
        let engine: Arc<dyn BrowserEngine> = Arc::clone(&browser) as Arc<dyn BrowserEngine>;
        Ok(engine)
    })
}

/// Default configuration rooted at `reports`
pub fn config_in(reports: &Path) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.paths.reports_dir = reports.to_path_buf();
    config
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
