//! Chrome DevTools Protocol backend for the portal session.
//!
//! - `cdp`: WebSocket command/event client
//! - `launcher`: locating and starting a local Chromium-family browser
//! - `portal`: `PortalSession` implementation with generation-scoped handles

pub mod cdp;
pub mod launcher;
pub mod portal;

use std::path::PathBuf;
use std::time::Duration;

use syllabus_core::{Config, Error, Paths, Result};

pub use launcher::{find_browser_binary, BrowserEngine, LaunchOptions};
pub use portal::CdpPortal;

/// Start the configured browser and wrap it as a portal session.
pub async fn launch_portal(config: &Config, paths: &Paths) -> Result<CdpPortal> {
    let profile_dir = config
        .browser
        .profile_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.browser_profile_dir());
    let opts = LaunchOptions {
        engine: BrowserEngine::parse(&config.browser.engine),
        headed: config.browser.headed,
        profile_dir,
        startup_timeout: Duration::from_secs(config.browser.startup_timeout_secs),
    };
    let process = launcher::launch(&opts).await.map_err(Error::Browser)?;
    Ok(CdpPortal::new(process, config.timing.page_load()))
}
