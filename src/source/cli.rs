//! yt-dlp based playlist source

use super::parser::{classify_failure, parse_playlist};
use super::traits::PlaylistSource;
use crate::config::ToolsConfig;
use crate::error::SourceError;
use crate::process::run_bounded;
use crate::types::Batch;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Base URL of a playlist page
const PLAYLIST_URL: &str = "https://www.youtube.com/playlist?list=";

/// Playlist listings carry one JSON record per item, so allow far more output than
/// the per-item tool calls
const MIN_LISTING_OUTPUT: usize = 16 * 1024 * 1024;

/// Playlist source that runs `yt-dlp --flat-playlist -J`
#[derive(Debug, Clone)]
pub struct YtDlpPlaylistSource {
    binary_path: PathBuf,
    timeout: Duration,
    max_output: usize,
}

impl YtDlpPlaylistSource {
    /// Create a source with an explicit binary path and default limits
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            timeout: ToolsConfig::default().playlist_timeout,
            max_output: MIN_LISTING_OUTPUT,
        }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Apply the timeout and output limits from the tools configuration
    pub fn with_limits(mut self, tools: &ToolsConfig) -> Self {
        self.timeout = tools.playlist_timeout;
        self.max_output = tools.max_output_bytes.max(MIN_LISTING_OUTPUT);
        self
    }
}

#[async_trait]
impl PlaylistSource for YtDlpPlaylistSource {
    async fn fetch_batch(
        &self,
        playlist_id: &str,
        cookies_file: Option<&Path>,
    ) -> Result<Batch, SourceError> {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("--flat-playlist").arg("-J");
        if let Some(cookies) = cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.arg(format!("{}{}", PLAYLIST_URL, playlist_id));

        tracing::info!(playlist_id, "Fetching playlist metadata");

        let output = run_bounded(cmd, self.max_output, self.timeout)
            .await
            .map_err(|e| SourceError::Failed(e.to_string()))?;

        if !output.success() {
            let diagnostic = output.diagnostic();
            tracing::warn!(playlist_id, error = %diagnostic, "playlist listing failed");
            return Err(classify_failure(playlist_id, &diagnostic));
        }
        if output.stdout_truncated {
            return Err(SourceError::Malformed(format!(
                "playlist listing exceeded {} bytes",
                self.max_output
            )));
        }

        let batch = parse_playlist(playlist_id, &String::from_utf8_lossy(&output.stdout))?;
        tracing::info!(
            playlist_id,
            name = %batch.name,
            items = batch.len(),
            "Playlist metadata retrieved"
        );
        Ok(batch)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
