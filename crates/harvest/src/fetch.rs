//! Downloading a file from a resolved URL, with bounded retries.

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use syllabus_core::config::TimingConfig;
use syllabus_core::{Error, Result};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::settle;

#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Fetch `url` into `dest`, returning the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Plain HTTP GET, streamed to `<dest>.part` and renamed on completion.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| Error::Fetch(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[async_trait]
impl FileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("Request failed for {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP {} for {}", status, url)));
        }

        let tmp = part_path(dest);
        let written = match stream_to(&mut response, url, &tmp, dest).await {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e);
            }
        };

        debug!(url = %url, bytes = written, "Fetched");
        Ok(written)
    }
}

/// Write the response body to `tmp`, then move it over `dest`. The caller
/// owns cleanup of `tmp` on error.
async fn stream_to(
    response: &mut reqwest::Response,
    url: &str,
    tmp: &Path,
    dest: &Path,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(tmp).await?;
    let mut written = 0u64;
    while let Some(bytes) = response
        .chunk()
        .await
        .map_err(|e| Error::Fetch(format!("Read failed for {}: {}", url, e)))?
    {
        file.write_all(&bytes).await?;
        written += bytes.len() as u64;
    }
    file.flush().await?;
    drop(file);
    tokio::fs::rename(tmp, dest).await?;
    Ok(written)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self {
            attempts: timing.fetch_attempts,
            delay: timing.fetch_retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_timing(&TimingConfig::default())
    }
}

/// Try up to `policy.attempts` times (at least once). The last error is
/// returned when every attempt fails.
pub async fn fetch_with_retry(
    fetcher: &dyn FileFetcher,
    url: &str,
    dest: &Path,
    policy: &RetryPolicy,
) -> Result<u64> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match fetcher.fetch(url, dest).await {
            Ok(n) => return Ok(n),
            Err(e) if attempt < attempts => {
                warn!(
                    attempt = attempt,
                    error = %e,
                    "Download failed ({}). Retrying {}/{}...",
                    e,
                    attempt,
                    attempts
                );
                settle(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
