use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::paths::Paths;

pub const USERNAME_ENV: &str = "SYLLABUS_USERNAME";
pub const PASSWORD_ENV: &str = "SYLLABUS_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalConfig {
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_tool_url")]
    pub tool_url: String,
    /// Substring of the tool page URL; anything else means we navigated away.
    #[serde(default = "default_tool_marker")]
    pub tool_marker: String,
    /// Partial text of the link that opens the tool after login.
    #[serde(default = "default_entry_link_text")]
    pub entry_link_text: String,
    #[serde(default = "default_semester_select_id")]
    pub semester_select_id: String,
    /// Options whose label contains this are the "none selected" placeholder.
    #[serde(default = "default_placeholder_marker")]
    pub placeholder_marker: String,
}

fn default_login_url() -> String {
    "https://app.acadoinformatics.com/syllabus/department/portal".to_string()
}

fn default_tool_url() -> String {
    "https://app.acadoinformatics.com/syllabus/department/tools/CourseCompletion".to_string()
}

fn default_tool_marker() -> String {
    "CourseCompletion".to_string()
}

fn default_entry_link_text() -> String {
    "Download Course Syllabi".to_string()
}

fn default_semester_select_id() -> String {
    "select-semester".to_string()
}

fn default_placeholder_marker() -> String {
    "Select".to_string()
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            tool_url: default_tool_url(),
            tool_marker: default_tool_marker(),
            entry_link_text: default_entry_link_text(),
            semester_select_id: default_semester_select_id(),
            placeholder_marker: default_placeholder_marker(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

/// Settle delays and fetch retry policy. All delays are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingConfig {
    #[serde(default = "default_page_load_ms")]
    pub page_load_ms: u64,
    #[serde(default = "default_login_settle_ms")]
    pub login_settle_ms: u64,
    /// Wait after selecting a semester during discovery.
    #[serde(default = "default_scan_settle_ms")]
    pub scan_settle_ms: u64,
    /// Wait after selecting a semester before downloading.
    #[serde(default = "default_select_settle_ms")]
    pub select_settle_ms: u64,
    #[serde(default = "default_navigation_settle_ms")]
    pub navigation_settle_ms: u64,
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,
    #[serde(default = "default_fetch_retry_delay_ms")]
    pub fetch_retry_delay_ms: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_page_load_ms() -> u64 {
    2000
}

fn default_login_settle_ms() -> u64 {
    3000
}

fn default_scan_settle_ms() -> u64 {
    2000
}

fn default_select_settle_ms() -> u64 {
    3000
}

fn default_navigation_settle_ms() -> u64 {
    3000
}

fn default_fetch_attempts() -> u32 {
    3
}

fn default_fetch_retry_delay_ms() -> u64 {
    2000
}

fn default_fetch_timeout_secs() -> u64 {
    120
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_load_ms: default_page_load_ms(),
            login_settle_ms: default_login_settle_ms(),
            scan_settle_ms: default_scan_settle_ms(),
            select_settle_ms: default_select_settle_ms(),
            navigation_settle_ms: default_navigation_settle_ms(),
            fetch_attempts: default_fetch_attempts(),
            fetch_retry_delay_ms: default_fetch_retry_delay_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl TimingConfig {
    /// No waits at all. Used by tests and dry runs against fakes.
    pub fn immediate() -> Self {
        Self {
            page_load_ms: 0,
            login_settle_ms: 0,
            scan_settle_ms: 0,
            select_settle_ms: 0,
            navigation_settle_ms: 0,
            fetch_attempts: default_fetch_attempts(),
            fetch_retry_delay_ms: 0,
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }

    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn login_settle(&self) -> Duration {
        Duration::from_millis(self.login_settle_ms)
    }

    pub fn scan_settle(&self) -> Duration {
        Duration::from_millis(self.scan_settle_ms)
    }

    pub fn select_settle(&self) -> Duration {
        Duration::from_millis(self.select_settle_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }

    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// "chrome" or "edge".
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default)]
    pub headed: bool,
    /// Profile directory; defaults to `<workdir>/browser-profile`.
    #[serde(default)]
    pub profile_dir: Option<String>,
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_engine() -> String {
    "chrome".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    15
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            headed: false,
            profile_dir: None,
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Let `SYLLABUS_USERNAME` / `SYLLABUS_PASSWORD` override the file.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(USERNAME_ENV).ok(),
            std::env::var(PASSWORD_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, username: Option<String>, password: Option<String>) {
        if let Some(username) = username.filter(|u| !u.trim().is_empty()) {
            self.credentials.username = username;
        }
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            self.credentials.password = password;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.credentials.is_complete() {
            return Err(Error::Config(format!(
                "credentials missing: set credentials in the config file or {} / {}",
                USERNAME_ENV, PASSWORD_ENV
            )));
        }
        for (name, url) in [
            ("portal.loginUrl", &self.portal.login_url),
            ("portal.toolUrl", &self.portal.tool_url),
        ] {
            if url.trim().is_empty() {
                return Err(Error::Config(format!("{} is empty", name)));
            }
        }
        if self.timing.fetch_attempts == 0 {
            return Err(Error::Config("timing.fetchAttempts must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let raw = r#"{
  "credentials": { "username": "chair", "password": "pw" },
  "timing": { "fetchAttempts": 5 }
}"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.credentials.username, "chair");
        assert_eq!(cfg.timing.fetch_attempts, 5);
        assert_eq!(cfg.timing.fetch_retry_delay_ms, 2000);
        assert_eq!(cfg.portal.semester_select_id, "select-semester");
        assert_eq!(cfg.portal.tool_marker, "CourseCompletion");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_credentials() {
        let cfg = Config::default();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains(USERNAME_ENV));
    }

    #[test]
    fn test_env_overrides_replace_file_values() {
        let mut cfg = Config::default();
        cfg.credentials.username = "from-file".into();
        cfg.apply_overrides(Some("from-env".into()), None);
        assert_eq!(cfg.credentials.username, "from-env");
        assert_eq!(cfg.credentials.password, "");

        cfg.apply_overrides(Some("   ".into()), Some("secret".into()));
        assert_eq!(cfg.credentials.username, "from-env");
        assert_eq!(cfg.credentials.password, "secret");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        let mut cfg = Config::default();
        cfg.browser.headed = true;
        cfg.save(&paths.config_file()).unwrap();

        let loaded = Config::load_or_default(&paths).unwrap();
        assert!(loaded.browser.headed);
        assert_eq!(loaded.portal.login_url, cfg.portal.login_url);
    }
}
