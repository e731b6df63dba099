//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use playrun_common::Status;
use playrun_e2e::report::format_duration;
use playrun_e2e::{ReportModel, ReportRow};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for ReportRow {
    fn headers() -> Vec<&'static str> {
        vec!["Status", "Category", "Module", "Test", "Steps", "Duration", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.status.as_str().to_uppercase(),
            self.category.clone(),
            self.module.clone(),
            self.title.clone(),
            self.steps.to_string(),
            self.duration_ms
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string()),
            self.error.clone(),
        ]
    }
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Passed => Color::Green,
        Status::Failed => Color::Red,
        Status::Skipped => Color::Yellow,
        Status::Unknown => Color::Grey,
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print the per-test table followed by the overall counts
pub fn print_report(model: &ReportModel, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(model).unwrap_or_default());
            return;
        }
        OutputFormat::Table if !model.rows.is_empty() => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(ReportRow::headers());
            for row in &model.rows {
                let mut cells = row.row().into_iter();
                let status = cells.next().unwrap_or_default();
                let mut line = vec![Cell::new(status).fg(status_color(row.status))];
                line.extend(cells.map(Cell::new));
                table.add_row(line);
            }
            println!("{table}");
        }
        _ => print_list(&model.rows, format),
    }

    let duration = model
        .duration_ms
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string());
    println!(
        "Total: {}  {}  {}  {}  Duration: {}",
        model.total,
        format!("Passed: {}", model.passed).green(),
        format!("Failed: {}", model.failed).red(),
        format!("Skipped: {}", model.skipped).yellow(),
        duration
    );
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
