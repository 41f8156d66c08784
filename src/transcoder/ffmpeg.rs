//! ffmpeg based transcoder

use super::traits::Transcoder;
use crate::config::ToolsConfig;
use crate::error::TranscodeError;
use crate::process::{ProcessError, run_bounded};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Transcoder that runs the external `ffmpeg` binary
///
/// Drops any video stream and encodes audio with `libmp3lame` at a constant bitrate.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary_path: PathBuf,
    timeout: Duration,
    max_output: usize,
}

impl FfmpegTranscoder {
    /// Create a transcoder with an explicit binary path and default limits
    pub fn new(binary_path: PathBuf) -> Self {
        let defaults = ToolsConfig::default();
        Self {
            binary_path,
            timeout: defaults.transcode_timeout,
            max_output: defaults.max_output_bytes,
        }
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Apply the timeout and output limits from the tools configuration
    pub fn with_limits(mut self, tools: &ToolsConfig) -> Self {
        self.timeout = tools.transcode_timeout;
        self.max_output = tools.max_output_bytes;
        self
    }

    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        bitrate_kbps: u32,
    ) -> Result<(), TranscodeError> {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-b:a")
            .arg(format!("{}k", bitrate_kbps))
            .arg(output);

        let result = run_bounded(cmd, self.max_output, self.timeout)
            .await
            .map_err(|e| match e {
                ProcessError::TimedOut { timeout, .. } => {
                    TranscodeError::TimedOut(timeout.as_secs())
                }
                other => TranscodeError::Spawn(other.to_string()),
            })?;

        if !result.success() {
            return Err(TranscodeError::Failed {
                exit_code: result.status.code(),
                diagnostic: result.diagnostic(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        bitrate_kbps: u32,
    ) -> Result<(), TranscodeError> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(TranscodeError::InputMissing(input.to_path_buf()));
        }

        let result = self.convert(input, output, bitrate_kbps).await;

        if let Err(e) = tokio::fs::remove_file(input).await {
            tracing::warn!(
                path = %input.display(),
                error = %e,
                "failed to remove staging file"
            );
        }

        match &result {
            Ok(()) => tracing::debug!(output = %output.display(), bitrate_kbps, "transcoded"),
            Err(e) => {
                // a half-written output is worse than none
                tokio::fs::remove_file(output).await.ok();
                tracing::debug!(input = %input.display(), error = %e, "transcode failed");
            }
        }
        result
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
