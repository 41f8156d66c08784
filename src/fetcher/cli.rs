//! yt-dlp based fetcher

use super::traits::{AssetFetcher, FetchRequest};
use crate::config::ToolsConfig;
use crate::error::FetchError;
use crate::process::{ProcessError, run_bounded};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Base URL of a single item
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Fetcher that runs the external `yt-dlp` binary
///
/// Downloads the best available audio-only stream of a single item, with playlist
/// expansion disabled, to the exact destination path of the request.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    binary_path: PathBuf,
    timeout: Duration,
    max_output: usize,
}

impl YtDlpFetcher {
    /// Create a fetcher with an explicit binary path and default limits
    pub fn new(binary_path: PathBuf) -> Self {
        let defaults = ToolsConfig::default();
        Self {
            binary_path,
            timeout: defaults.fetch_timeout,
            max_output: defaults.max_output_bytes,
        }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Apply the timeout and output limits from the tools configuration
    pub fn with_limits(mut self, tools: &ToolsConfig) -> Self {
        self.timeout = tools.fetch_timeout;
        self.max_output = tools.max_output_bytes;
        self
    }

    fn command(&self, request: &FetchRequest) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("-f")
            .arg("bestaudio")
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--force-overwrites")
            .arg("-o")
            .arg(&request.destination);
        if let Some(cookies) = &request.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.arg(format!("{}{}", WATCH_URL, request.item_id));
        cmd
    }
}

#[async_trait]
impl AssetFetcher for YtDlpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<PathBuf, FetchError> {
        let output = run_bounded(self.command(request), self.max_output, self.timeout)
            .await
            // a timeout reads "... timed out after Ns", which classifies as a network failure
            .map_err(|e: ProcessError| FetchError::new(e.to_string()))?;

        if !output.success() {
            return Err(FetchError::with_exit_code(
                output.diagnostic(),
                output.status.code(),
            ));
        }

        if !tokio::fs::try_exists(&request.destination)
            .await
            .unwrap_or(false)
        {
            return Err(FetchError::with_exit_code(
                format!(
                    "yt-dlp reported success but {} was not written",
                    request.destination.display()
                ),
                output.status.code(),
            ));
        }

        tracing::debug!(
            item_id = %request.item_id,
            path = %request.destination.display(),
            "fetched raw audio"
        );
        Ok(request.destination.clone())
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
