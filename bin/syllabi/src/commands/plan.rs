use anyhow::Context as _;
use std::path::PathBuf;
use syllabus_browser::launch_portal;
use syllabus_harvest::{plan_harvest, DiscoveryOutcome};
use tracing::info;

use super::Context;

/// Entry step and discovery only. Nothing is downloaded.
pub async fn run(ctx: &Context, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    config.validate()?;

    let mut portal = launch_portal(&config, &ctx.paths).await?;
    let result = plan_harvest(&mut portal, &config).await;
    portal.shutdown().await;
    let outcome = result?;

    for line in plan_lines(&outcome) {
        info!("{}", line);
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&outcome.work_list)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Work list written to {}", path.display());
    }

    Ok(())
}

/// One header per semester followed by its records, then the unexpected skips.
fn plan_lines(outcome: &DiscoveryOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    for group in outcome.work_list.by_semester() {
        lines.push(format!("{} ({} syllabi)", group.semester, group.records.len()));
        for record in &group.records {
            lines.push(format!(
                "  {:<24} {:<40} {}",
                record.category(),
                record.course(),
                record.uploaded
            ));
        }
    }

    let problems: Vec<_> = outcome.problems().collect();
    if !problems.is_empty() {
        lines.push("Skipped during scan:".to_string());
        for skip in problems {
            match &skip.category {
                Some(category) => {
                    lines.push(format!("  {} / {}: {}", skip.semester, category, skip.reason))
                }
                None => lines.push(format!("  {}: {}", skip.semester, skip.reason)),
            }
        }
    }
    lines
}
