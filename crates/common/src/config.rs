//! Harness configuration
//!
//! Two layers feed a run:
//! - `HarnessConfig`: typed settings loaded from TOML (or defaults)
//! - `PropertyStore`: flat `key=value` properties, a base file overlaid by an
//!   optional local file that is kept out of version control
//!
//! Both are wrapped by a `ConfigRegistry` that is built once per process and
//! shared by reference with everything that needs settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{CapturePolicy, Viewport};

pub const VIDEO_CAPTURE: &str = "VIDEO_CAPTURE";
pub const SCREENSHOT_CAPTURE: &str = "SCREENSHOT_CAPTURE";
pub const HEADLESS: &str = "HEADLESS";
pub const REPORT_TITLE: &str = "REPORT_TITLE";
pub const RUN_PARALLEL: &str = "RUN_PARALLEL";
pub const REPORTS_DIR: &str = "PLAYRUN_REPORTS_DIR";

/// Typed key/value lookup
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Process environment as a config source
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Flat properties loaded from `key=value` files
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    values: HashMap<String, String>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse properties text. Blank lines and `#` comments are ignored.
    pub fn parse(content: &str) -> Self {
        let mut values = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim().to_string(), expand_value(value.trim()));
            }
        }
        Self { values }
    }

    /// Load a single properties file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::PropertyFileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Load `base`, then overlay `overlay` when it exists
    pub fn load_layered(base: &Path, overlay: &Path) -> Result<Self> {
        let mut store = Self::from_file(base)?;
        if overlay.exists() {
            debug!("Applying property overlay {}", overlay.display());
            store.merge(Self::from_file(overlay)?);
        }
        Ok(store)
    }

    /// Overlay another store; its values win
    pub fn merge(&mut self, other: PropertyStore) {
        self.values.extend(other.values);
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigSource for PropertyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Strip surrounding quotes, expand `${VAR}`, `$VAR` and a leading `~`
fn expand_value(raw: &str) -> String {
    let unquoted = if raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')))
    {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };

    let mut out = String::with_capacity(unquoted.len());
    let mut chars = unquoted.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let mut name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            let mut closed = false;
            for n in chars.by_ref() {
                if n == '}' {
                    closed = true;
                    break;
                }
                name.push(n);
            }
            if !closed {
                out.push_str("${");
                out.push_str(&name);
                continue;
            }
            match std::env::var(&name) {
                Ok(v) => out.push_str(&v),
                Err(_) => {
                    out.push_str("${");
                    out.push_str(&name);
                    out.push('}');
                }
            }
        } else {
            while let Some(&n) = chars.peek() {
                if n.is_ascii_alphanumeric() || n == '_' {
                    name.push(n);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                out.push('$');
                continue;
            }
            match std::env::var(&name) {
                Ok(v) => out.push_str(&v),
                Err(_) => {
                    out.push('$');
                    out.push_str(&name);
                }
            }
        }
    }

    if out == "~" || out.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}{}", PathBuf::from(home).display(), &out[1..]);
        }
    }
    out
}

/// Harness configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Artifact locations
    pub paths: PathsConfig,

    /// Screenshot/video capture
    pub capture: CaptureConfig,

    /// Browser context settings
    pub browser: BrowserConfig,

    /// External test command and report settings
    pub runner: RunnerConfig,
}

/// Artifact locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of every generated artifact
    pub reports_dir: PathBuf,

    /// Directory holding `qa.properties` and its local overlay
    pub config_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("reports"),
            config_dir: PathBuf::from("config"),
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub video: CapturePolicy,

    pub screenshot: CapturePolicy,

    /// Also write captured screenshots under the worker screenshot dir
    pub persist_screenshots: bool,

    /// Recordings at or below this size are treated as empty
    pub min_video_bytes: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            video: CapturePolicy::Never,
            screenshot: CapturePolicy::Never,
            persist_screenshots: false,
            min_video_bytes: 1024,
        }
    }
}

/// Browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub viewport: Viewport,

    pub headless: bool,

    /// Delay between engine operations when running headed
    pub slow_mo_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            headless: true,
            slow_mo_ms: 250,
        }
    }
}

impl BrowserConfig {
    /// Operation delay for new browsing contexts, zero when headless
    pub fn slow_mo(&self) -> Duration {
        if self.headless {
            Duration::ZERO
        } else {
            Duration::from_millis(self.slow_mo_ms)
        }
    }
}

/// External test command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Command line that executes the UI test suite
    pub command: Vec<String>,

    /// `off`, `auto` or a worker count
    pub parallelism: String,

    /// Title of the shareable HTML report
    pub report_title: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "cargo".to_string(),
                "test".to_string(),
                "--test".to_string(),
                "ui".to_string(),
            ],
            parallelism: "3".to_string(),
            report_title: "UI Automation Execution Report".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay well-known property keys from a source
    pub fn apply_source(&mut self, source: &dyn ConfigSource) {
        if let Some(v) = source.get(VIDEO_CAPTURE) {
            self.capture.video = CapturePolicy::from_video_setting(Some(&v));
        }
        if let Some(v) = source.get(SCREENSHOT_CAPTURE) {
            self.capture.screenshot = CapturePolicy::from_screenshot_setting(Some(&v));
        }
        if let Some(v) = source.get(HEADLESS).or_else(|| source.get("headless")) {
            match v.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "headless" => self.browser.headless = true,
                "false" | "no" | "0" | "headed" => self.browser.headless = false,
                _ => {}
            }
        }
        if let Some(v) = source.get(REPORT_TITLE) {
            if !v.trim().is_empty() {
                self.runner.report_title = v.trim().to_string();
            }
        }
        if let Some(v) = source.get(RUN_PARALLEL) {
            self.runner.parallelism = v.trim().to_string();
        }
        if let Some(v) = source.get(REPORTS_DIR) {
            self.paths.reports_dir = PathBuf::from(v.trim());
        }
    }

    pub fn results_dir(&self) -> PathBuf {
        self.paths.reports_dir.join("test-results")
    }

    pub fn report_path(&self) -> PathBuf {
        self.paths.reports_dir.join("shareable_report.html")
    }
}

/// Process-wide configuration, built once and passed by reference
#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
    config: HarnessConfig,
    properties: PropertyStore,
}

impl ConfigRegistry {
    pub fn new(config: HarnessConfig, properties: PropertyStore) -> Self {
        let mut config = config;
        config.apply_source(&properties);
        Self { config, properties }
    }

    /// Load TOML settings from `config_file` and properties from the
    /// configured config dir, then the variables `playrun run` exports to
    /// the test process. Missing property files are not an error.
    pub fn load(config_file: &Path) -> Result<Self> {
        let config = HarnessConfig::load(config_file)?;
        let base = config.paths.config_dir.join("qa.properties");
        let overlay = config.paths.config_dir.join("qa.local.properties");
        let properties = if base.exists() {
            PropertyStore::load_layered(&base, &overlay)?
        } else if overlay.exists() {
            PropertyStore::from_file(&overlay)?
        } else {
            debug!("No property files under {}", config.paths.config_dir.display());
            PropertyStore::new()
        };
        let mut registry = Self::new(config, properties);
        registry.config.apply_source(&EnvSource);
        Ok(registry)
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut HarnessConfig {
        &mut self.config
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }
}

impl ConfigSource for ConfigRegistry {
    /// Properties win over the process environment
    fn get(&self, key: &str) -> Option<String> {
        self.properties
            .get(key)
            .or_else(|| std::env::var(key).ok())
    }
}
