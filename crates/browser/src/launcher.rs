//! Launching a local Chromium-family browser with remote debugging enabled.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use super::cdp::CdpClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserEngine {
    Chrome,
    Edge,
}

impl BrowserEngine {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "edge" | "msedge" => Self::Edge,
            _ => Self::Chrome,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
        }
    }

    fn candidates(&self) -> &'static [&'static str] {
        match self {
            Self::Chrome => {
                if cfg!(target_os = "macos") {
                    &[
                        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                        "/Applications/Chromium.app/Contents/MacOS/Chromium",
                    ]
                } else if cfg!(target_os = "linux") {
                    &[
                        "google-chrome",
                        "google-chrome-stable",
                        "chromium",
                        "chromium-browser",
                    ]
                } else {
                    &[
                        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                    ]
                }
            }
            Self::Edge => {
                if cfg!(target_os = "macos") {
                    &["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"]
                } else if cfg!(target_os = "linux") {
                    &["microsoft-edge", "microsoft-edge-stable"]
                } else {
                    &[
                        r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                        r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                    ]
                }
            }
        }
    }
}

/// Options for [`launch`].
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub engine: BrowserEngine,
    pub headed: bool,
    pub profile_dir: PathBuf,
    pub startup_timeout: Duration,
}

/// A running browser process plus the CDP connection to its first page.
pub struct BrowserProcess {
    pub engine: BrowserEngine,
    pub debug_port: u16,
    pub cdp: CdpClient,
    child: Child,
}

impl BrowserProcess {
    pub async fn shutdown(mut self) {
        if let Err(e) = self.cdp.close_browser().await {
            debug!("Browser.close failed (may already be closed): {}", e);
        }
        let _ = self.child.kill().await;
    }
}

impl Drop for BrowserProcess {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Locate an installed browser binary. Bare names are resolved on `PATH`.
pub fn find_browser_binary(engine: BrowserEngine) -> Option<String> {
    for candidate in engine.candidates() {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        let bare = !candidate.contains('/') && !candidate.contains('\\');
        if bare {
            if let Ok(path) = which::which(candidate) {
                return Some(path.display().to_string());
            }
        }
    }
    None
}

pub async fn launch(opts: &LaunchOptions) -> Result<BrowserProcess, String> {
    let binary = find_browser_binary(opts.engine)
        .ok_or_else(|| format!("{} not found. Please install it.", opts.engine.name()))?;

    std::fs::create_dir_all(&opts.profile_dir)
        .map_err(|e| format!("Failed to create profile dir: {}", e))?;

    let debug_port = find_free_port().await?;
    let args = browser_args(debug_port, &opts.profile_dir, opts.headed);

    info!(
        browser = opts.engine.name(),
        port = debug_port,
        headed = opts.headed,
        "Launching browser"
    );

    let child = Command::new(&binary)
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("Failed to launch {}: {}", opts.engine.name(), e))?;

    wait_for_cdp_ready(debug_port, opts.startup_timeout).await?;
    let page_ws_url = page_ws_url(debug_port).await?;
    let cdp = CdpClient::connect(&page_ws_url).await?;

    cdp.enable_domain("Page").await?;
    cdp.enable_domain("Runtime").await?;

    info!(ws_url = %page_ws_url, "CDP connection established");

    Ok(BrowserProcess {
        engine: opts.engine,
        debug_port,
        cdp,
        child,
    })
}

fn browser_args(debug_port: u16, profile_dir: &Path, headed: bool) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", profile_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--password-store=basic".to_string(),
    ];
    if !headed {
        args.push("--headless=new".to_string());
    }
    args.push("--window-size=1280,900".to_string());
    args.push("about:blank".to_string());
    args
}

async fn find_free_port() -> Result<u16, String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| format!("Failed to bind to find free port: {}", e))?;
    let port = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local addr: {}", e))?
        .port();
    Ok(port)
}

/// Poll `/json/version` until the debugger answers.
async fn wait_for_cdp_ready(port: u16, timeout: Duration) -> Result<(), String> {
    let start = Instant::now();
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(format!(
                "browser debugger not ready after {}s on port {}",
                timeout.as_secs(),
                port
            ));
        }
        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if body.get("webSocketDebuggerUrl").is_some() {
                    return Ok(());
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// WebSocket URL of the first "page" target listed by `/json/list`.
async fn page_ws_url(port: u16) -> Result<String, String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let Ok(resp) = reqwest::get(&url).await else {
            continue;
        };
        let Ok(targets) = resp.json::<Vec<Value>>().await else {
            continue;
        };
        if let Some(ws) = first_page_target(&targets) {
            return Ok(ws);
        }
    }

    Err("No page target found after retries".to_string())
}

fn first_page_target(targets: &[Value]) -> Option<String> {
    targets
        .iter()
        .filter(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
        .find_map(|t| t.get("webSocketDebuggerUrl").and_then(|v| v.as_str()))
        .map(str::to_string)
}
