use std::sync::Arc;
use syllabus_core::config::Config;
use syllabus_core::portal::PortalSession;
use syllabus_core::{Paths, Result};
use tracing::info;

use crate::discovery::{DiscoveryOutcome, DiscoveryPlanner};
use crate::entry::open_tool;
use crate::executor::{DownloadExecutor, DownloadSummary};
use crate::fetch::FileFetcher;
use crate::guard::SessionGuard;
use crate::layout::DownloadLayout;
use crate::report::{write_report, ReportOutcome};

#[derive(Debug)]
pub struct HarvestSummary {
    pub discovery: DiscoveryOutcome,
    pub download: DownloadSummary,
    pub report: ReportOutcome,
}

/// Open the tool and build the work list without downloading anything.
pub async fn plan_harvest<P>(session: &mut P, config: &Config) -> Result<DiscoveryOutcome>
where
    P: PortalSession + ?Sized,
{
    let guard = SessionGuard::new(config);
    open_tool(session, config, &guard).await?;
    DiscoveryPlanner::new(config, guard).plan(session).await
}

/// One full run: entry, discovery, download, report.
///
/// Only the fatal conditions (entry link or semester selector missing) and
/// a failure to write the report surface as errors.
pub async fn run_harvest<P>(
    session: &mut P,
    config: &Config,
    paths: &Paths,
    fetcher: Arc<dyn FileFetcher>,
) -> Result<HarvestSummary>
where
    P: PortalSession + ?Sized,
{
    let discovery = plan_harvest(session, config).await?;

    let guard = SessionGuard::new(config);
    let layout = DownloadLayout::new(paths.downloads_dir());
    let executor = DownloadExecutor::new(config, guard, layout, fetcher);
    let download = executor.execute(session, &discovery.work_list).await;

    let report = write_report(&paths.report_file(), &download.failures).await?;
    info!(
        downloaded = download.downloaded,
        skipped = download.skipped,
        missing = download.failures.len(),
        "Run complete"
    );

    Ok(HarvestSummary {
        discovery,
        download,
        report,
    })
}
