use std::sync::Arc;
use syllabus_browser::launch_portal;
use syllabus_harvest::{run_harvest, HarvestSummary, HttpFetcher, ReportOutcome};
use tracing::info;

use super::Context;

/// Entry step, discovery, download and report.
pub async fn run(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    config.validate()?;
    ctx.paths.ensure_dirs()?;

    let fetcher = Arc::new(HttpFetcher::new(config.timing.fetch_timeout())?);

    info!(engine = %config.browser.engine, headed = config.browser.headed, "Starting browser...");
    let mut portal = launch_portal(&config, &ctx.paths).await?;
    let result = run_harvest(&mut portal, &config, &ctx.paths, fetcher).await;
    portal.shutdown().await;
    let summary = result?;

    for line in summary_lines(&summary) {
        info!("{}", line);
    }

    Ok(())
}

fn summary_lines(summary: &HarvestSummary) -> Vec<String> {
    let mut lines = vec![
        format!("Discovered:  {}", summary.discovery.work_list.len()),
        format!("Downloaded:  {}", summary.download.downloaded),
        format!("Up to date:  {}", summary.download.skipped),
        format!("Missing:     {}", summary.download.failures.len()),
    ];
    if let ReportOutcome::Written { path, .. } = &summary.report {
        lines.push(format!("Report:      {}", path.display()));
    }
    lines
}
