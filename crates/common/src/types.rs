//! Core types for Playrun

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Kind of shared external engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Browser-automation engine
    Browser,
    /// Relational database bridge
    Database,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Browser => write!(f, "browser"),
            EngineKind::Database => write!(f, "database"),
        }
    }
}

/// When an artifact is kept for the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePolicy {
    Always,
    OnFailure,
    Never,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self::Never
    }
}

impl CapturePolicy {
    /// Parse a `VIDEO_CAPTURE` value. Anything unrecognized means `never`.
    pub fn from_video_setting(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("always") => Self::Always,
            Some("failures") | Some("on-failure") | Some("on_failure") => Self::OnFailure,
            _ => Self::Never,
        }
    }

    /// Parse a `SCREENSHOT_CAPTURE` value. Only `always` enables capture.
    pub fn from_screenshot_setting(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("always") => Self::Always,
            _ => Self::Never,
        }
    }

    /// Whether an artifact is kept for a test with the given outcome
    pub fn keeps(&self, test_passed: bool) -> bool {
        match self {
            CapturePolicy::Always => true,
            CapturePolicy::OnFailure => !test_passed,
            CapturePolicy::Never => false,
        }
    }
}

impl std::fmt::Display for CapturePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapturePolicy::Always => write!(f, "always"),
            CapturePolicy::OnFailure => write!(f, "failures"),
            CapturePolicy::Never => write!(f, "never"),
        }
    }
}

/// Canonical test status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
    Unknown,
}

impl Status {
    /// Map a raw status string onto the canonical set; `broken` counts as failed.
    pub fn normalize(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Status::Unknown;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "passed" | "pass" => Status::Passed,
            "failed" | "fail" | "broken" => Status::Failed,
            "skipped" | "skip" => Status::Skipped,
            _ => Status::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
            Status::Unknown => "unknown",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Status::Failed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Degree of worker parallelism for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// Single worker, identified as `master`
    Off,
    /// One worker per available core
    Auto,
    /// Fixed number of workers
    Workers(usize),
}

impl Default for Parallelism {
    fn default() -> Self {
        Self::Workers(3)
    }
}

impl Parallelism {
    /// Resolve to a concrete worker count; `None` means a serial run.
    pub fn worker_count(&self) -> Option<usize> {
        match self {
            Parallelism::Off => None,
            Parallelism::Auto => Some(
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1),
            ),
            Parallelism::Workers(n) => Some(*n),
        }
    }
}

impl FromStr for Parallelism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "serial" | "0" => Ok(Parallelism::Off),
            "auto" | "" => Ok(Parallelism::Auto),
            other => match other.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Parallelism::Workers(n)),
                _ => Err(Error::InvalidParallelism(s.to_string())),
            },
        }
    }
}

impl std::fmt::Display for Parallelism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parallelism::Off => write!(f, "off"),
            Parallelism::Auto => write!(f, "auto"),
            Parallelism::Workers(n) => write!(f, "{}", n),
        }
    }
}

/// Browser viewport size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}
