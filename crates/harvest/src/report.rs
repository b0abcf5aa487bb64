//! Markdown report of the courses that could not be downloaded.

use std::path::{Path, PathBuf};
use syllabus_core::types::FailureEntry;
use syllabus_core::Result;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    AllDownloaded,
    Written { path: PathBuf, missing: usize },
}

/// Keep a value inside its table cell.
fn cell(value: &str) -> String {
    value
        .replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

pub fn render_report(entries: &[FailureEntry]) -> String {
    let mut out = String::new();
    out.push_str("# Missing Syllabi Report\n\n");
    out.push_str(&format!("Total Missing: {}\n\n", entries.len()));
    out.push_str("| Semester | Category | Course | Reason |\n");
    out.push_str("|---|---|---|---|\n");
    for entry in entries {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            cell(&entry.semester),
            cell(&entry.category),
            cell(&entry.course),
            cell(&entry.reason.to_string()),
        ));
    }
    out
}

/// Write the report to `path` if anything failed; otherwise write nothing.
pub async fn write_report(path: &Path, entries: &[FailureEntry]) -> Result<ReportOutcome> {
    if entries.is_empty() {
        info!("All syllabi downloaded successfully!");
        return Ok(ReportOutcome::AllDownloaded);
    }

    tokio::fs::write(path, render_report(entries)).await?;
    info!(
        missing = entries.len(),
        "Report generated: {}",
        path.display()
    );
    Ok(ReportOutcome::Written {
        path: path.to_path_buf(),
        missing: entries.len(),
    })
}
