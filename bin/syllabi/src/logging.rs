//! Run log: every operator-facing message goes to stdout and to `run.log`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const WORKSPACE_TARGETS: &str = "syllabi=debug,syllabus_core=debug,syllabus_browser=debug,syllabus_harvest=debug";

/// Keeps the file sink flushing until dropped. Hold it for the whole process.
pub struct RunLog {
    path: PathBuf,
    _guard: WorkerGuard,
}

impl RunLog {
    /// Install the global subscriber with a stdout layer and an appending
    /// file layer at `log_file`.
    pub fn init(log_file: &Path, verbose: bool) -> Result<Self> {
        let (writer, guard) = file_writer(log_file)?;

        tracing_subscriber::registry()
            .with(env_filter(verbose))
            .with(fmt::layer().with_target(false))
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init()
            .context("Failed to install log subscriber")?;

        Ok(Self {
            path: log_file.to_path_buf(),
            _guard: guard,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Non-blocking writer appending to `log_file`. Parent directories are
/// created as needed.
pub fn file_writer(log_file: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let dir = match log_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = log_file
        .file_name()
        .with_context(|| format!("Log path has no file name: {}", log_file.display()))?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new(format!("info,{}", WORKSPACE_TARGETS));
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
