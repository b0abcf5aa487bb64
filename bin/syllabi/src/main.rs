mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use syllabus_core::Paths;
use tracing::{error, info};

use crate::commands::Context;
use crate::logging::RunLog;

#[derive(Parser)]
#[command(name = "syllabi")]
#[command(about = "Download every course syllabus from the department portal", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Working directory for downloads, report, log and config
    #[arg(short, long, global = true)]
    workdir: Option<PathBuf>,

    /// Config file (defaults to <workdir>/syllabi.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, discover every syllabus and download the missing ones (default)
    Run,

    /// Log in and list what would be downloaded
    Plan {
        /// Write the work list as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check configuration, credentials and browser availability
    Doctor,

    /// Write a default config file
    Init {
        /// Overwrite an existing config without asking
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.workdir {
        Some(dir) => Paths::with_base(dir),
        None => Paths::new(),
    };
    std::fs::create_dir_all(&paths.base)?;

    let log = RunLog::init(&paths.log_file(), cli.verbose)?;
    info!(
        log = %log.path().display(),
        "=== syllabi started {} ===",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let config_path = cli.config.unwrap_or_else(|| paths.config_file());
    let ctx = Context {
        paths,
        config_path,
        headed: cli.headed,
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(&ctx).await,
        Commands::Plan { output } => commands::plan::run(&ctx, output).await,
        Commands::Doctor => commands::doctor::run(&ctx).await,
        Commands::Init { force } => commands::init::run(&ctx, force).await,
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
