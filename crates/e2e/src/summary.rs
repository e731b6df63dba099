//! One-line failure summaries
//!
//! Both entry points are heuristics over free-form text. They never panic and
//! never return an error; a miss yields a placeholder.

use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound, in characters, for a summary
pub const MAX_SUMMARY_CHARS: usize = 300;

const PLACEHOLDER: &str = "Failure";

static ERROR_LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"\b\w*(?:Error|Exception):|^thread '.*' panicked\b").ok()
});

/// Where a failure originated, when the runner knows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashLocation {
    pub path: String,
    pub line: u32,
    pub message: String,
}

/// Raw failure information for one test
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFailure {
    pub crash: Option<CrashLocation>,
    pub trace: String,
}

impl RawFailure {
    pub fn from_trace(trace: impl Into<String>) -> Self {
        Self {
            crash: None,
            trace: trace.into(),
        }
    }

    pub fn with_crash(mut self, path: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        self.crash = Some(CrashLocation {
            path: path.into(),
            line,
            message: message.into(),
        });
        self
    }
}

/// Reduce a failure to a single line of at most [`MAX_SUMMARY_CHARS`].
///
/// A crash location wins outright. Otherwise the last error line, the last
/// source-location line and the last wait/timeout line are joined with
/// `" | "`; failing all of that, the last non-blank line.
pub fn summarize(failure: &RawFailure) -> String {
    if let Some(crash) = &failure.crash {
        let message = one_line(&crash.message);
        if !message.is_empty() {
            let base = crash.path.rsplit(['/', '\\']).next().unwrap_or("");
            return truncate(&format!("{}:{} - {}", base, crash.line, message));
        }
    }

    let lines: Vec<&str> = failure
        .trace
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();

    let last_error = lines.iter().rev().find_map(|l| error_text(l));

    let location = lines
        .iter()
        .rev()
        .find(|l| l.contains("tests/") || l.contains("pages/"))
        .map(|l| l.trim());

    let waiting = lines
        .iter()
        .rev()
        .find(|l| {
            l.to_lowercase().contains("waiting for") || l.contains("Locator.") || l.contains("Timeout")
        })
        .map(|l| l.trim());

    let mut parts: Vec<&str> = Vec::new();
    if let Some(loc) = location {
        parts.push(loc);
    }
    if let Some(err) = last_error {
        if !parts.contains(&err) {
            parts.push(err);
        }
    }
    if let Some(wait) = waiting {
        if !parts.contains(&wait) {
            parts.push(wait);
        }
    }

    if !parts.is_empty() {
        return truncate(&parts.join(" | "));
    }
    match lines.last() {
        Some(last) => truncate(last.trim()),
        None => PLACEHOLDER.to_string(),
    }
}

/// Collapse every run of whitespace, newlines included, to one space
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The error text of a marker line, if `line` is one
fn error_text(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("E ") {
        return Some(rest.trim());
    }
    let trimmed = line.trim();
    let is_marker = ERROR_LINE
        .as_ref()
        .map(|re| re.is_match(trimmed))
        .unwrap_or(false);
    is_marker.then_some(trimmed)
}

/// Short error cell for the report table, from a record's status details.
///
/// Prefers `AssertionError:`/`TimeoutError:` lines, then the text after
/// `Error:`, then the first line that is not step or locator context. A
/// `Caller:` line in the message is prefixed. Returns `"-"` when empty.
pub fn short_error(message: &str, trace: &str) -> String {
    let msg_lines: Vec<&str> = message.lines().filter(|l| !l.trim().is_empty()).collect();
    let trace_lines: Vec<&str> = trace.lines().filter(|l| !l.trim().is_empty()).collect();

    let caller = msg_lines.iter().find_map(|l| {
        let trimmed = l.trim();
        if trimmed.to_lowercase().starts_with("caller:") {
            trimmed.get("caller:".len()..).map(str::trim)
        } else {
            None
        }
    });

    let detail = pick_detail(&msg_lines).or_else(|| pick_detail(&trace_lines));

    match (caller, detail) {
        (Some(caller), Some(detail)) if !caller.is_empty() && !detail.contains(caller) => {
            format!("{} - {}", caller, detail)
        }
        (_, Some(detail)) => detail.to_string(),
        (Some(caller), None) if !caller.is_empty() => caller.to_string(),
        _ => "-".to_string(),
    }
}

fn pick_detail<'a>(lines: &[&'a str]) -> Option<&'a str> {
    if let Some(line) = lines.iter().map(|l| l.trim()).find(|l| {
        l.starts_with("AssertionError:") || l.starts_with("TimeoutError:")
    }) {
        return Some(line);
    }

    if let Some(line) = lines.iter().map(|l| l.trim()).find(|l| l.contains("Error:")) {
        let after = line.split_once("Error:").map(|(_, rest)| rest.trim()).unwrap_or("");
        return Some(if after.is_empty() { line } else { after });
    }

    lines.iter().map(|l| l.trim()).find(|l| {
        let low = l.to_lowercase();
        !l.is_empty() && !low.starts_with("step") && !low.starts_with("locator:")
    })
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_SUMMARY_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
