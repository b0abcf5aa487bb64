//! Download executor: replay the work list semester by semester.
//!
//! Row handles are always scraped fresh after selecting a semester and are
//! thrown away whenever the page may have changed underneath them.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use syllabus_core::config::{Config, PortalConfig, TimingConfig};
use syllabus_core::portal::{ElementHandle, Locator, OptionChoice, PortalSession};
use syllabus_core::types::{FailureEntry, FailureReason, Record, SemesterGroup, WorkList};
use syllabus_core::{Error, Result};
use tracing::{debug, error, info, warn};

use crate::fetch::{fetch_with_retry, FileFetcher, RetryPolicy};
use crate::guard::SessionGuard;
use crate::layout::{url_extension, DownloadLayout};
use crate::{settle, COURSE_ROWS_XPATH, LINK_CELL, NAME_CELL};

#[derive(Debug, Default, Clone, Serialize)]
pub struct DownloadSummary {
    pub downloaded: usize,
    /// Already present on disk.
    pub skipped: usize,
    pub failures: Vec<FailureEntry>,
}

impl DownloadSummary {
    pub fn attempted(&self) -> usize {
        self.downloaded + self.skipped + self.failures.len()
    }
}

enum CourseStep {
    Downloaded,
    AlreadyPresent,
    RowMissing,
}

/// Course name (trimmed cell text) to row handle, for one page generation.
type RowIndex = HashMap<String, ElementHandle>;

pub struct DownloadExecutor {
    guard: SessionGuard,
    portal: PortalConfig,
    timing: TimingConfig,
    layout: DownloadLayout,
    fetcher: Arc<dyn FileFetcher>,
    retry: RetryPolicy,
}

impl DownloadExecutor {
    pub fn new(
        config: &Config,
        guard: SessionGuard,
        layout: DownloadLayout,
        fetcher: Arc<dyn FileFetcher>,
    ) -> Self {
        Self {
            guard,
            portal: config.portal.clone(),
            timing: config.timing.clone(),
            layout,
            fetcher,
            retry: RetryPolicy::from_timing(&config.timing),
        }
    }

    pub fn layout(&self) -> &DownloadLayout {
        &self.layout
    }

    /// Download everything in `work`. Never fails; problems end up in
    /// [`DownloadSummary::failures`] or in the log.
    pub async fn execute<P>(&self, session: &mut P, work: &WorkList) -> DownloadSummary
    where
        P: PortalSession + ?Sized,
    {
        info!("--- Starting Download Phase ---");
        let mut summary = DownloadSummary::default();
        for group in work.by_semester() {
            if let Err(e) = self.run_group(session, &group, &mut summary).await {
                error!(semester = %group.semester, error = %e, "Error processing semester {}", group.semester);
            }
        }
        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failures.len(),
            "Download phase finished"
        );
        summary
    }

    async fn run_group<P>(
        &self,
        session: &mut P,
        group: &SemesterGroup<'_>,
        summary: &mut DownloadSummary,
    ) -> Result<()>
    where
        P: PortalSession + ?Sized,
    {
        info!("Processing Semester: {}", group.semester);
        self.guard.ensure(session).await;

        let select = self.guard.semester_select();
        session
            .select_option(&select, &OptionChoice::Label(group.semester.to_string()))
            .await?;
        settle(self.timing.select_settle()).await;

        let mut rows: Option<RowIndex> = None;
        for record in &group.records {
            let index = match rows.take() {
                Some(index) => index,
                None => scan_rows(session).await?,
            };

            match self.download_one(session, record, &index).await {
                Ok(CourseStep::Downloaded) => {
                    summary.downloaded += 1;
                    rows = Some(index);
                }
                Ok(CourseStep::AlreadyPresent) => {
                    summary.skipped += 1;
                    rows = Some(index);
                }
                Ok(CourseStep::RowMissing) => {
                    warn!(course = %record.course(), "Row not found for {}", record.course());
                    summary
                        .failures
                        .push(FailureEntry::new(record, FailureReason::RowNotFound));
                    rows = Some(index);
                }
                Err(e) => {
                    error!(course = %record.course(), error = %e, "Error downloading {}", record.course());
                    summary
                        .failures
                        .push(FailureEntry::new(record, FailureReason::Error(e.to_string())));
                    if !self.recover(session, &e).await {
                        rows = Some(index);
                    }
                }
            }
        }
        Ok(())
    }

    async fn download_one<P>(
        &self,
        session: &mut P,
        record: &Record,
        rows: &RowIndex,
    ) -> Result<CourseStep>
    where
        P: PortalSession + ?Sized,
    {
        let course = record.course();
        let dir = self.layout.dir_for(record.semester(), record.category());
        if self.layout.probe_path(&dir, course).exists() {
            debug!(course = %course, "Already downloaded, skipping");
            return Ok(CourseStep::AlreadyPresent);
        }

        let Some(row) = rows.get(course) else {
            return Ok(CourseStep::RowMissing);
        };

        let href = resolve_link(session, row).await?;
        let dest = self.layout.file_path(&dir, course, &url_extension(&href));

        tokio::fs::create_dir_all(&dir).await?;
        info!("Downloading: {}", course);
        fetch_with_retry(self.fetcher.as_ref(), &href, &dest, &self.retry).await?;
        info!("Downloaded to {}", dest.display());
        Ok(CourseStep::Downloaded)
    }

    /// Put the session back on the tool page after a failed course.
    /// Returns `true` when the current row handles must be re-scraped.
    async fn recover<P>(&self, session: &mut P, err: &Error) -> bool
    where
        P: PortalSession + ?Sized,
    {
        let mut rescan = err.is_stale();

        match session.current_location().await {
            Ok(location) if !location.contains(&self.portal.tool_marker) => {
                warn!(location = %location, "Navigated away from the tool page. Going back...");
                if let Err(e) = session.back().await {
                    warn!(error = %e, "Going back failed");
                }
                settle(self.timing.navigation_settle()).await;
                rescan = true;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Could not read current location");
                rescan = true;
            }
        }

        if rescan {
            debug!("Row handles invalidated, re-scanning");
        }
        rescan
    }
}

/// Map every course row on the current page by its trimmed name cell.
/// Rows that cannot be read are left out; their courses then report as
/// missing rows.
async fn scan_rows<P>(session: &mut P) -> Result<RowIndex>
where
    P: PortalSession + ?Sized,
{
    let rows = session
        .find_all(None, &Locator::xpath(COURSE_ROWS_XPATH))
        .await?;
    let mut index = RowIndex::with_capacity(rows.len());
    let mut unreadable = 0usize;
    for row in rows {
        match row_name(session, &row).await {
            Ok(Some(name)) => {
                index.insert(name, row);
            }
            Ok(None) => {}
            Err(e) => {
                debug!(error = %e, "Skipping unreadable row");
                unreadable += 1;
            }
        }
    }
    debug!(rows = index.len(), unreadable = unreadable, "Scanned course rows");
    Ok(index)
}

/// Trimmed text of the name cell, or `None` for rows without cells.
async fn row_name<P>(session: &mut P, row: &ElementHandle) -> Result<Option<String>>
where
    P: PortalSession + ?Sized,
{
    let cells = session.find_all(Some(row), &Locator::tag("td")).await?;
    let Some(name_cell) = cells.get(NAME_CELL) else {
        return Ok(None);
    };
    let name = session.read_text(name_cell).await?.trim().to_string();
    Ok((!name.is_empty()).then_some(name))
}

/// The download URL of a row: the `href` of the anchor in the link cell,
/// made absolute against the current location if needed.
async fn resolve_link<P>(session: &mut P, row: &ElementHandle) -> Result<String>
where
    P: PortalSession + ?Sized,
{
    let cells = session.find_all(Some(row), &Locator::tag("td")).await?;
    let cell = cells
        .get(LINK_CELL)
        .ok_or_else(|| Error::NotFound("link cell".to_string()))?;
    let link = session
        .find_first(Some(cell), &Locator::tag("a"))
        .await?
        .ok_or_else(|| Error::NotFound("download link".to_string()))?;
    let href = session
        .read_attribute(&link, "href")
        .await?
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::NotFound("href on download link".to_string()))?;

    if url::Url::parse(&href).is_ok() {
        return Ok(href);
    }
    let base = session.current_location().await?;
    url::Url::parse(&base)
        .and_then(|b| b.join(&href))
        .map(|u| u.to_string())
        .map_err(|e| Error::Fetch(format!("Cannot resolve link '{}': {}", href, e)))
}
