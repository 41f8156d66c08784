//! Per-item job pipeline
//!
//! A [`JobPipeline`] takes one item from `Pending` to a terminal phase:
//!
//! 1. `Fetching`: wait for connectivity, fetch the raw audio, retry network failures
//!    within the attempt budget
//! 2. `Converting`: transcode once into the output directory
//! 3. `Completed` or `Failed`
//!
//! Every phase change is broadcast as a [`ProgressEvent`]. The pipeline never
//! returns an error: every outcome ends up in the returned [`ItemResult`].

use crate::config::RetryConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::FetchError;
use crate::fetcher::{AssetFetcher, FetchRequest};
use crate::retry::retry_with_connectivity;
use crate::transcoder::Transcoder;
use crate::types::{Event, Item, ItemResult, JobState, Phase, ProgressEvent};
use crate::utils::sanitize_filename;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Where a pipeline reads from and writes to, and how it converts
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    /// Directory for raw fetched files
    pub staging_dir: PathBuf,
    /// Directory for finished files
    pub output_dir: PathBuf,
    /// Target MP3 bitrate in kbps
    pub bitrate_kbps: u32,
    /// Cookies file passed to the fetcher
    pub cookies_file: Option<PathBuf>,
    /// Fetch retry budget and backoff
    pub retry: RetryConfig,
}

/// Runs fetch → transcode for one item at a time
///
/// Shared by every worker of a batch; per-item state lives on the stack of
/// [`JobPipeline::run`].
pub struct JobPipeline {
    fetcher: Arc<dyn AssetFetcher>,
    transcoder: Arc<dyn Transcoder>,
    monitor: Arc<ConnectivityMonitor>,
    event_tx: broadcast::Sender<Event>,
    settings: PipelineSettings,
}

impl JobPipeline {
    /// Create a pipeline from its collaborators
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        transcoder: Arc<dyn Transcoder>,
        monitor: Arc<ConnectivityMonitor>,
        event_tx: broadcast::Sender<Event>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            transcoder,
            monitor,
            event_tx,
            settings,
        }
    }

    /// Output directory of finished files
    pub fn output_dir(&self) -> &Path {
        &self.settings.output_dir
    }

    /// Process `item`, writing `<output_stem>.mp3` into the output directory
    ///
    /// `position` is the item's index in its batch and keeps staging files of
    /// repeated items apart.
    pub async fn run(&self, item: &Item, position: usize, output_stem: &str) -> ItemResult {
        let mut state = JobState::new();
        state.advance(Phase::Fetching);
        self.emit_progress(item, &state);

        let staging = self.settings.staging_dir.join(format!(
            "{:04}-{}.audio",
            position,
            sanitize_filename(item.id.as_str())
        ));
        let request = FetchRequest::new(item.id.clone(), staging.clone())
            .with_cookies(self.settings.cookies_file.clone());

        let retry = &self.settings.retry;
        let outcome = retry_with_connectivity(
            retry,
            &self.monitor,
            |attempt, e: &FetchError| {
                self.event_tx
                    .send(Event::RetryScheduled {
                        item_id: item.id.clone(),
                        attempt,
                        max_attempts: retry.max_attempts,
                        error: e.to_string(),
                    })
                    .ok();
            },
            |attempt| {
                tracing::debug!(
                    item_id = %item.id,
                    attempt,
                    fetcher = self.fetcher.name(),
                    "fetching"
                );
                self.fetcher.fetch(&request)
            },
        )
        .await;
        state.attempts = outcome.attempts;

        let raw = match outcome.result {
            Ok(path) => path,
            Err(failure) => {
                tokio::fs::remove_file(&staging).await.ok();
                return self.fail(item, position, state, failure.describe());
            }
        };

        state.advance(Phase::Converting);
        self.emit_progress(item, &state);

        let output = self
            .settings
            .output_dir
            .join(format!("{}.mp3", output_stem));
        if let Err(e) = self
            .transcoder
            .transcode(&raw, &output, self.settings.bitrate_kbps)
            .await
        {
            return self.fail(item, position, state, e.to_string());
        }

        state.advance(Phase::Completed);
        self.emit_progress(item, &state);
        tracing::info!(
            item_id = %item.id,
            attempts = state.attempts,
            path = %output.display(),
            "Item completed"
        );

        ItemResult {
            item_id: item.id.clone(),
            title: item.title.clone(),
            position,
            success: true,
            output_path: Some(output),
            error: None,
            attempts: state.attempts,
            finished_at: Utc::now(),
        }
    }

    fn fail(&self, item: &Item, position: usize, mut state: JobState, error: String) -> ItemResult {
        tracing::warn!(
            item_id = %item.id,
            title = %item.title,
            phase = %state.phase,
            attempts = state.attempts,
            error = %error,
            "Item failed"
        );
        state.fail(error.clone());
        self.emit_progress(item, &state);

        ItemResult {
            item_id: item.id.clone(),
            title: item.title.clone(),
            position,
            success: false,
            output_path: None,
            error: Some(error),
            attempts: state.attempts,
            finished_at: Utc::now(),
        }
    }

    fn emit_progress(&self, item: &Item, state: &JobState) {
        self.event_tx
            .send(Event::Progress(ProgressEvent {
                item_id: item.id.clone(),
                title: item.title.clone(),
                phase: state.phase,
                percent: state.percent,
                attempt: state.attempts,
                error: state.last_error.clone(),
            }))
            .ok();
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
