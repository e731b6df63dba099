//! Result aggregation and the shareable HTML report

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local};
use playrun_common::Status;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::E2eResult;
use crate::record::{ResultRecord, RESULT_SUFFIX};
use crate::summary::short_error;

/// Read every `*-result.json` in `results_dir`.
///
/// Files that cannot be read or parsed are skipped one by one. A missing
/// directory yields no records.
pub fn load_all(results_dir: &Path) -> Vec<ResultRecord> {
    if !results_dir.is_dir() {
        warn!("Results directory not found: {}", results_dir.display());
        return Vec::new();
    }

    let mut paths: Vec<_> = WalkDir::new(results_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", results_dir.display(), e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(RESULT_SUFFIX))
        .map(|e| e.into_path())
        .collect();
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match ResultRecord::read(&path) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping malformed result {}: {}", path.display(), e),
        }
    }
    info!("Loaded {} result records from {}", records.len(), results_dir.display());
    records
}

/// Canonical status for a raw value
pub fn normalize_status(raw: Option<&str>) -> Status {
    Status::normalize(raw)
}

/// One line of the detail table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub name: String,
    pub category: String,
    pub module: String,
    pub title: String,
    pub description: String,
    pub steps: usize,
    pub status: Status,
    /// Short failure text, `-` when there is none
    pub error: String,
    pub duration_ms: Option<i64>,
}

impl ReportRow {
    fn from_record(record: &ResultRecord) -> Self {
        let (message, trace) = record.failure_details();
        Self {
            name: record.name.clone(),
            category: record.category(),
            module: record.module(),
            title: record.title().to_string(),
            description: record.description_text().to_string(),
            steps: record.step_count(),
            status: record.status(),
            error: short_error(&message, &trace),
            duration_ms: record.duration_ms(),
        }
    }
}

/// Aggregate view of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportModel {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// `max(stop) - min(start)` over records with both timestamps
    pub duration_ms: Option<i64>,
    pub generated_at: DateTime<Local>,
    /// Failed first, then by test name
    pub rows: Vec<ReportRow>,
}

impl ReportModel {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Build the report model from every record found
pub fn summarize(records: &[ResultRecord], generated_at: DateTime<Local>) -> ReportModel {
    let count = |status: Status| records.iter().filter(|r| r.status() == status).count();

    let timed = records.iter().filter_map(|r| match (r.start, r.stop) {
        (Some(start), Some(stop)) => Some((start, stop)),
        _ => None,
    });
    let window = timed.fold(None, |acc: Option<(i64, i64)>, (start, stop)| match acc {
        None => Some((start, stop)),
        Some((lo, hi)) => Some((lo.min(start), hi.max(stop))),
    });
    let duration_ms = window.and_then(|(lo, hi)| (hi >= lo).then_some(hi - lo));

    let mut rows: Vec<ReportRow> = records.iter().map(ReportRow::from_record).collect();
    rows.sort_by(|a, b| {
        (!a.status.is_failed(), &a.name).cmp(&(!b.status.is_failed(), &b.name))
    });

    ReportModel {
        total: records.len(),
        passed: count(Status::Passed),
        failed: count(Status::Failed),
        skipped: count(Status::Skipped),
        duration_ms,
        generated_at,
        rows,
    }
}

/// `4.0s` under a minute, `1m 5s` above
pub fn format_duration(ms: i64) -> String {
    let secs = ms as f64 / 1000.0;
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let whole = ms / 1000;
        format!("{}m {}s", whole / 60, whole % 60)
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Passed => "PASS",
        Status::Failed => "FAIL",
        Status::Skipped => "SKIP",
        Status::Unknown => "?",
    }
}

const STYLE: &str = r#"<style>
body { font-family: Verdana, Arial, sans-serif; font-size: 13px; color: #111; margin: 0; background:#f5f6f8; }
.container { max-width: 1400px; margin: 0 auto; padding: 18px 18px 28px 18px; }
.title { background-color:#507963; color:#ffffff; padding:12px; font-size:20px; font-weight:600; text-align:center; display:block; margin:0; }
.card { background:#fff; border:1px solid #e7eaef; border-radius:8px; box-shadow: 0 1px 6px rgba(0,0,0,.06); margin-top:16px; overflow:hidden; }
.card h2 { margin:0; padding:12px 14px; font-size:15px; font-weight:800; background:#f7f8fa; border-bottom:1px solid #e7eaef; color:#222; display:flex; align-items:center; justify-content:space-between; }
.card .body { padding: 12px 14px; }
.table { width:100%; border-collapse: collapse; }
.table th, .table td { border:1px solid #e3e6eb; padding:8px; font-size:13px; vertical-align: top; }
.table th { background:#7D6655; color:#FCFCFC; text-align:center; }
.status-pill { padding:3px 10px; border-radius:14px; font-weight:600; color:#000; display:inline-block; }
.pass { background:#99CC66; }
.fail { background:#FF6962; }
.skip { background:#BDC3C7; }
.total { background:#A7C7E7; }
.error { color:#D8000C; font-weight:500; }
.center { text-align:center; }
.dim { color:#555; }
</style>"#;

/// Render the report as a self-contained HTML document.
///
/// Pure: the same model and title always give the same output.
pub fn render_html(model: &ReportModel, title: &str) -> String {
    let title = escape_html(title);
    let mut html = String::with_capacity(4096 + model.rows.len() * 512);

    html.push_str("<!DOCTYPE html><html><head><meta charset='utf-8'>");
    let _ = write!(html, "<title>{}</title>", title);
    html.push_str(STYLE);
    html.push_str("</head><body><div class='container'>");
    let _ = write!(html, "<h1 class='title'>{}</h1>", title);

    let _ = write!(
        html,
        "<div class='card'><h2><span>Overall Summary</span>\
         <span class='dim'>Execution Date &amp; Time: {}</span></h2><div class='body'>",
        model.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    html.push_str("<table class='table'>");
    html.push_str(
        "<tr><th>Total Tests</th><th>Passed</th><th>Failed</th><th>Skipped</th><th>Duration</th></tr>",
    );
    let _ = write!(
        html,
        "<tr><td class='center'><span class='status-pill total'>{}</span></td>\
         <td class='center'><span class='status-pill pass'>{}</span></td>\
         <td class='center'><span class='status-pill fail'>{}</span></td>\
         <td class='center'><span class='status-pill skip'>{}</span></td>\
         <td class='center'>{}</td></tr>",
        model.total,
        model.passed,
        model.failed,
        model.skipped,
        model.duration_ms.map(format_duration).unwrap_or_else(|| "-".to_string())
    );
    html.push_str("</table></div></div>");

    html.push_str("<div class='card'><h2>Tests Level Summary</h2><div class='body'>");
    html.push_str("<table class='table'>");
    html.push_str(
        "<tr><th>Category</th><th>Module</th><th>Test Title</th><th>Test Description</th>\
         <th>Steps</th><th>Status</th><th>Error</th><th>Duration</th></tr>",
    );

    if model.rows.is_empty() {
        html.push_str("<tr><td colspan='8' class='center dim'>No tests found</td></tr>");
    }
    for row in &model.rows {
        let description = if row.description.is_empty() {
            "-".to_string()
        } else {
            escape_html(&row.description)
        };
        let error_class = if row.error == "-" { "center" } else { "error" };
        let _ = write!(
            html,
            "<tr><td class='center'>{}</td><td class='center'>{}</td><td>{}</td><td>{}</td>\
             <td class='center'>{}</td><td class='center' title='{}'>{}</td><td class='{}'>{}</td>\
             <td class='center'>{}</td></tr>",
            escape_html(&row.category),
            escape_html(&row.module),
            escape_html(&row.title),
            description,
            row.steps,
            row.status,
            status_icon(row.status),
            error_class,
            escape_html(&row.error),
            row.duration_ms.map(format_duration).unwrap_or_else(|| "-".to_string())
        );
    }
    html.push_str("</table></div></div>");
    html.push_str("</div></body></html>");
    html
}

/// Render and write the report, creating parent directories
pub fn write_report(model: &ReportModel, title: &str, output: &Path) -> E2eResult<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, render_html(model, title))?;
    info!("Wrote {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Label;
    use chrono::TimeZone;
    use test_case::test_case;

    fn record(name: &str, status: &str, start: Option<i64>, stop: Option<i64>) -> ResultRecord {
        serde_json::from_value(serde_json::json!({
            "uuid": name,
            "name": name,
            "status": status,
            "start": start,
            "stop": stop,
        }))
        .unwrap()
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).single().unwrap()
    }

    #[test_case(Some("broken") => Status::Failed ; "broken is failed")]
    #[test_case(None => Status::Unknown ; "missing is unknown")]
    #[test_case(Some("PASSED") => Status::Passed ; "case insensitive")]
    #[test_case(Some("xfail") => Status::Unknown ; "unrecognized")]
    fn test_normalize_status(raw: Option<&str>) -> Status {
        normalize_status(raw)
    }

    #[test_case(4000 => "4.0s")]
    #[test_case(59_949 => "59.9s")]
    #[test_case(65_000 => "1m 5s")]
    #[test_case(3_600_000 => "60m 0s")]
    fn test_format_duration(ms: i64) -> String {
        format_duration(ms)
    }

    #[test]
    fn test_duration_window() {
        let records = vec![
            record("a", "passed", Some(1000), Some(4000)),
            record("b", "passed", Some(2000), Some(5000)),
            record("c", "skipped", None, Some(9000)),
        ];
        let model = summarize(&records, fixed_time());
        assert_eq!(model.duration_ms, Some(4000));
        assert_eq!(model.total, 3);
        assert_eq!(model.skipped, 1);
    }

    #[test]
    fn test_rows_failed_first() {
        let records = vec![
            record("zeta", "failed", None, None),
            record("alpha", "passed", None, None),
            record("beta", "broken", None, None),
        ];
        let model = summarize(&records, fixed_time());
        let names: Vec<_> = model.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["beta", "zeta", "alpha"]);
        assert_eq!(model.failed, 2);
        assert!(model.has_failures());
    }

    #[test]
    fn test_render_escapes_and_is_deterministic() {
        let mut bad = record("x<script>", "failed", Some(1), Some(2));
        bad.description = Some("a & b".to_string());
        let model = summarize(&[bad], fixed_time());

        let first = render_html(&model, "Nightly <UI>");
        let second = render_html(&model, "Nightly <UI>");
        assert_eq!(first, second);
        assert!(first.contains("<title>Nightly &lt;UI&gt;</title>"));
        assert!(first.contains("x&lt;script&gt;"));
        assert!(first.contains("a &amp; b"));
        assert!(first.contains("2026-03-14 09:26:53"));
        assert!(!first.contains("<script>"));
    }

    #[test]
    fn test_rows_show_category() {
        let mut ui = record("checkout", "passed", Some(1), Some(2));
        ui.labels.push(Label::new("category", "ui"));
        ui.labels.push(Label::new("module", "Cart"));
        let model = summarize(&[ui, record("bare", "passed", Some(1), Some(2))], fixed_time());
        assert_eq!(model.rows[0].category, "-");
        assert_eq!(model.rows[1].category, "UI");

        let html = render_html(&model, "Nightly");
        assert!(html.contains("<th>Category</th><th>Module</th>"));
        assert!(html.contains("<tr><td class='center'>UI</td><td class='center'>Cart</td><td>checkout</td>"));
        assert!(html.contains("<tr><td class='center'>-</td><td class='center'>-</td><td>bare</td>"));
    }

    #[test]
    fn test_empty_report() {
        let model = summarize(&[], fixed_time());
        let html = render_html(&model, "Empty");
        assert!(html.contains("No tests found"));
        assert_eq!(model.duration_ms, None);
    }

    #[test]
    fn test_load_all_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        record("ok", "passed", None, None).write(dir.path()).unwrap();
        std::fs::write(dir.path().join("bad-result.json"), b"{ not json").unwrap();
        std::fs::write(dir.path().join("environment.properties"), b"Browser=chromium").unwrap();

        let records = load_all(dir.path());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ok");
        assert!(load_all(&dir.path().join("missing")).is_empty());
    }
}
