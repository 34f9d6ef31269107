//! Console tables and banners.

use std::path::Path;

use engine::{Operation, RunReport, TransferOutcome};

/// Width of one path column.
pub const COLUMN_WIDTH: usize = 75;

/// Pad `text` to the column width, or keep its tail with a `...` prefix.
pub fn format_column(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= COLUMN_WIDTH {
        return format!("{:<width$}", text, width = COLUMN_WIDTH);
    }
    let tail: String = chars[chars.len() - (COLUMN_WIDTH - 3)..].iter().collect();
    format!("...{}", tail)
}

/// One `source  -->  detail` row.
pub fn format_row(left: &Path, right: &str) -> String {
    format!(
        "{}  -->  {}",
        format_column(&left.display().to_string()),
        format_column(right)
    )
}

/// Dash-framed title line.
pub fn heading(title: &str) -> String {
    let side = "-".repeat(COLUMN_WIDTH.saturating_sub(title.len().saturating_sub(7) / 2));
    format!("{}{}{}", side, title, side)
}

/// A titled table of outcomes, or `empty` when there are none.
pub fn render_table(outcomes: &[TransferOutcome], title: &str, empty: &str) -> String {
    let mut out = format!("\n{}\n", heading(title));
    if outcomes.is_empty() {
        out.push_str(empty);
        out.push('\n');
    }
    for outcome in outcomes {
        out.push_str(&format_row(&outcome.source_path, &outcome.detail()));
        out.push('\n');
    }
    out
}

pub fn start_banner(operation: Operation, source: &Path, destination: &Path) -> String {
    match operation {
        Operation::Backup(_) => format!("Backing up from {} to {}...", source.display(), destination.display()),
        Operation::Restore => format!("Restoring from {} to {}...", source.display(), destination.display()),
    }
}

pub fn finish_banner(operation: Operation) -> &'static str {
    match operation {
        Operation::Backup(_) => "\n--> Backup operation completed!",
        Operation::Restore => "\n--> Restore operation completed!",
    }
}

/// Tables requested for a finished run.
pub fn render_report(report: &RunReport, show_errors: bool, show_successes: bool) -> String {
    let mut out = String::new();
    if show_errors {
        out.push_str(&render_table(&report.errors, "ERROR INFORMATION", "Everything is OK!"));
    }
    if show_successes {
        let (title, empty) = match report.operation {
            Operation::Backup(_) => ("BACK UP INFORMATION", "No one entry has been backed up!"),
            Operation::Restore => ("RESTORE INFORMATION", "No one entry has been restored!"),
        };
        out.push_str(&render_table(&report.successes, title, empty));
    }
    out
}
