//! Discovery-then-download workflow for the syllabus portal.
//!
//! Everything here talks to the portal through
//! [`syllabus_core::PortalSession`]; nothing depends on a real browser.

pub mod discovery;
pub mod entry;
pub mod executor;
pub mod fetch;
pub mod guard;
pub mod layout;
pub mod pipeline;
pub mod report;
pub mod sanitize;

use std::time::Duration;

/// Category headings on the tool page.
pub const CATEGORY_HEADING_CSS: &str = "h3.table-title";
/// The table belonging to a category heading.
pub const CATEGORY_TABLE_XPATH: &str = "following-sibling::table[1]";
/// Every course row on the tool page, all categories.
pub const COURSE_ROWS_XPATH: &str = "//table/tbody/tr";

/// Cells a course row must have: name, link, two unused columns, upload date.
pub const MIN_ROW_CELLS: usize = 5;
pub const NAME_CELL: usize = 0;
pub const LINK_CELL: usize = 1;
pub const DATE_CELL: usize = 4;

pub use discovery::{DiscoveryOutcome, DiscoveryPlanner, RowOutcome, ScanSkip, SkipReason};
pub use executor::{DownloadExecutor, DownloadSummary};
pub use fetch::{fetch_with_retry, FileFetcher, HttpFetcher, RetryPolicy};
pub use guard::{GuardOutcome, SessionGuard};
pub use layout::DownloadLayout;
pub use pipeline::{plan_harvest, run_harvest, HarvestSummary};
pub use report::{render_report, write_report, ReportOutcome};
pub use sanitize::sanitize_filename;

/// Fixed wait after a state-changing interaction.
pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
