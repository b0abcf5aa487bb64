//! Discovery planner: walk every semester once and collect the work list.
//!
//! Scanning is best-effort. Each row, category and semester yields an
//! outcome; failures become [`ScanSkip`]s and the scan moves on. Only a
//! missing semester selector at the very start aborts discovery.

use serde::Serialize;
use std::fmt;
use syllabus_core::config::{Config, PortalConfig, TimingConfig};
use syllabus_core::portal::{ElementHandle, Locator, OptionChoice, PortalSession};
use syllabus_core::{Error, RecordKey, Result, WorkList};
use tracing::{debug, info, warn};

use crate::guard::SessionGuard;
use crate::{
    settle, CATEGORY_HEADING_CSS, CATEGORY_TABLE_XPATH, DATE_CELL, LINK_CELL, MIN_ROW_CELLS,
    NAME_CELL,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The "none selected" entry of the semester dropdown.
    Placeholder,
    TooFewCells(usize),
    NoDownloadLink,
    RowUnreadable(String),
    CategoryFailed(String),
    SemesterFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Placeholder => f.write_str("placeholder option"),
            SkipReason::TooFewCells(n) => write!(f, "row has {} cells", n),
            SkipReason::NoDownloadLink => f.write_str("no download link"),
            SkipReason::RowUnreadable(e) => write!(f, "row unreadable: {}", e),
            SkipReason::CategoryFailed(e) => write!(f, "category failed: {}", e),
            SkipReason::SemesterFailed(e) => write!(f, "semester failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSkip {
    pub semester: String,
    pub category: Option<String>,
    pub reason: SkipReason,
}

/// Result of reading one table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted { course: String, uploaded: String },
    Skipped(SkipReason),
}

#[derive(Debug, Default, Serialize)]
pub struct DiscoveryOutcome {
    pub work_list: WorkList,
    pub skips: Vec<ScanSkip>,
    pub semesters_scanned: usize,
}

impl DiscoveryOutcome {
    /// Skips other than the expected ones (placeholder and header rows).
    pub fn problems(&self) -> impl Iterator<Item = &ScanSkip> {
        self.skips.iter().filter(|s| {
            !matches!(
                s.reason,
                SkipReason::Placeholder | SkipReason::TooFewCells(_) | SkipReason::NoDownloadLink
            )
        })
    }
}

enum SemesterStep {
    Scanned,
    Placeholder,
    OutOfRange,
}

pub struct DiscoveryPlanner {
    guard: SessionGuard,
    portal: PortalConfig,
    timing: TimingConfig,
}

impl DiscoveryPlanner {
    pub fn new(config: &Config, guard: SessionGuard) -> Self {
        Self {
            guard,
            portal: config.portal.clone(),
            timing: config.timing.clone(),
        }
    }

    pub async fn plan<P>(&self, session: &mut P) -> Result<DiscoveryOutcome>
    where
        P: PortalSession + ?Sized,
    {
        info!("Fetching semester list...");
        self.guard.ensure(session).await;

        let select = self.guard.semester_select();
        let options = session
            .list_options(&select)
            .await
            .map_err(|e| Error::SelectorNotFound(format!("{}: {}", select, e)))?;
        let total = options.len();
        info!(count = total, "Found {} semesters.", total);

        let mut outcome = DiscoveryOutcome::default();
        for index in 0..total {
            match self.scan_semester(session, &select, index, total, &mut outcome).await {
                Ok(SemesterStep::Scanned) => outcome.semesters_scanned += 1,
                Ok(SemesterStep::Placeholder) => {}
                Ok(SemesterStep::OutOfRange) => break,
                Err(e) => {
                    let semester = options
                        .get(index)
                        .map(|o| o.label.clone())
                        .unwrap_or_else(|| format!("option #{}", index));
                    warn!(index = index, error = %e, "Error processing semester index {}", index);
                    outcome.skips.push(ScanSkip {
                        semester,
                        category: None,
                        reason: SkipReason::SemesterFailed(e.to_string()),
                    });
                }
            }
        }

        info!(
            total = outcome.work_list.len(),
            semesters = outcome.semesters_scanned,
            "Total entries found (to be downloaded): {}",
            outcome.work_list.len()
        );
        Ok(outcome)
    }

    async fn scan_semester<P>(
        &self,
        session: &mut P,
        select: &Locator,
        index: usize,
        total: usize,
        outcome: &mut DiscoveryOutcome,
    ) -> Result<SemesterStep>
    where
        P: PortalSession + ?Sized,
    {
        self.guard.ensure(session).await;

        // Fresh read: the list from a previous page is not trusted.
        let options = session.list_options(select).await?;
        let Some(option) = options.into_iter().nth(index) else {
            return Ok(SemesterStep::OutOfRange);
        };
        let semester = option.label;

        if semester.contains(&self.portal.placeholder_marker) {
            debug!(label = %semester, "Skipping placeholder option");
            outcome.skips.push(ScanSkip {
                semester,
                category: None,
                reason: SkipReason::Placeholder,
            });
            return Ok(SemesterStep::Placeholder);
        }

        info!("[{}/{}] Scanning: {}", index + 1, total, semester);
        session
            .select_option(select, &OptionChoice::Index(index))
            .await?;
        settle(self.timing.scan_settle()).await;

        let headings = session
            .find_all(None, &Locator::css(CATEGORY_HEADING_CSS))
            .await?;
        let mut found = 0usize;
        for heading in &headings {
            let category = match session.read_text(heading).await {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    outcome.skips.push(ScanSkip {
                        semester: semester.clone(),
                        category: None,
                        reason: SkipReason::CategoryFailed(e.to_string()),
                    });
                    continue;
                }
            };
            match self
                .scan_category(session, &semester, &category, heading, outcome)
                .await
            {
                Ok(n) => found += n,
                Err(e) => {
                    debug!(category = %category, error = %e, "Category skipped");
                    outcome.skips.push(ScanSkip {
                        semester: semester.clone(),
                        category: Some(category),
                        reason: SkipReason::CategoryFailed(e.to_string()),
                    });
                }
            }
        }

        if found > 0 {
            info!("   -> Found {} syllabi.", found);
        }
        Ok(SemesterStep::Scanned)
    }

    async fn scan_category<P>(
        &self,
        session: &mut P,
        semester: &str,
        category: &str,
        heading: &ElementHandle,
        outcome: &mut DiscoveryOutcome,
    ) -> Result<usize>
    where
        P: PortalSession + ?Sized,
    {
        let table = session
            .find_first(Some(heading), &Locator::xpath(CATEGORY_TABLE_XPATH))
            .await?
            .ok_or_else(|| Error::NotFound(format!("table after heading '{}'", category)))?;
        let rows = session.find_all(Some(&table), &Locator::tag("tr")).await?;

        let mut found = 0usize;
        for row in &rows {
            let row_outcome = match scan_row(session, row).await {
                Ok(o) => o,
                Err(e) => RowOutcome::Skipped(SkipReason::RowUnreadable(e.to_string())),
            };
            match row_outcome {
                RowOutcome::Accepted { course, uploaded } => {
                    outcome
                        .work_list
                        .upsert(RecordKey::new(semester, category, course), uploaded);
                    found += 1;
                }
                RowOutcome::Skipped(reason) => outcome.skips.push(ScanSkip {
                    semester: semester.to_string(),
                    category: Some(category.to_string()),
                    reason,
                }),
            }
        }
        Ok(found)
    }
}

/// Read one course row: name, link presence and upload date.
pub async fn scan_row<P>(session: &mut P, row: &ElementHandle) -> Result<RowOutcome>
where
    P: PortalSession + ?Sized,
{
    let cells = session.find_all(Some(row), &Locator::tag("td")).await?;
    if cells.len() < MIN_ROW_CELLS {
        return Ok(RowOutcome::Skipped(SkipReason::TooFewCells(cells.len())));
    }

    let course = session.read_text(&cells[NAME_CELL]).await?.trim().to_string();
    let links = session
        .find_all(Some(&cells[LINK_CELL]), &Locator::tag("a"))
        .await?;
    if links.is_empty() {
        return Ok(RowOutcome::Skipped(SkipReason::NoDownloadLink));
    }
    let uploaded = session.read_text(&cells[DATE_CELL]).await?.trim().to_string();

    Ok(RowOutcome::Accepted { course, uploaded })
}
