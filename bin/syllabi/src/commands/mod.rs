pub mod doctor;
pub mod init;
pub mod plan;
pub mod run;

use anyhow::Context as _;
use std::path::PathBuf;
use syllabus_core::{Config, Paths};

/// Resolved global options shared by every command.
pub struct Context {
    pub paths: Paths,
    pub config_path: PathBuf,
    pub headed: bool,
}

impl Context {
    /// Config file (or defaults), then environment, then CLI flags.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = if self.config_path.exists() {
            Config::load(&self.config_path)
                .with_context(|| format!("Failed to load {}", self.config_path.display()))?
        } else {
            Config::default()
        };
        config.apply_env();
        if self.headed {
            config.browser.headed = true;
        }
        Ok(config)
    }
}
