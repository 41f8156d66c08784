//! Bounded-concurrency batch scheduler
//!
//! [`Scheduler::run_batch`] runs one [`JobPipeline`] per batch item on a fixed-size
//! worker pool and collects exactly one [`ItemResult`] per item, in batch order,
//! regardless of the order in which items finish.
//!
//! Worker slots are handed out in batch order: the scheduler acquires a semaphore
//! permit before spawning each job, and the job releases it when it reaches a
//! terminal phase. A failing or panicking job only affects its own item.
//!
//! # Example
//!
//! ```no_run
//! use playlist_dl::config::Config;
//! use playlist_dl::connectivity::{ConnectivityMonitor, HttpConnectivityProbe};
//! use playlist_dl::fetcher::YtDlpFetcher;
//! use playlist_dl::scheduler::Scheduler;
//! use playlist_dl::transcoder::FfmpegTranscoder;
//! use playlist_dl::types::Batch;
//! use std::sync::Arc;
//!
//! # async fn example(batch: Batch) -> playlist_dl::Result<()> {
//! let config = Config::default();
//! let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
//! let probe = Arc::new(HttpConnectivityProbe::from_config(&config.connectivity)?);
//! let monitor = Arc::new(ConnectivityMonitor::new(probe, &config.connectivity));
//!
//! let scheduler = Scheduler::new(
//!     Arc::new(YtDlpFetcher::from_path().expect("yt-dlp not found")),
//!     Arc::new(FfmpegTranscoder::from_path().expect("ffmpeg not found")),
//!     monitor,
//!     event_tx,
//!     &config,
//! );
//! let results = scheduler.run_batch(&batch, 5).await?;
//! println!("{} of {} succeeded", results.iter().filter(|r| r.success).count(), results.len());
//! # Ok(())
//! # }
//! ```

use crate::config::{Config, DownloadConfig, RetryConfig};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result};
use crate::fetcher::AssetFetcher;
use crate::pipeline::{JobPipeline, PipelineSettings};
use crate::transcoder::Transcoder;
use crate::types::{Batch, Event, Item, ItemResult, Phase, ProgressEvent};
use crate::utils::{assign_output_stems, playlist_output_dir};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, broadcast};

/// Runs batches of items through the job pipeline
pub struct Scheduler {
    fetcher: Arc<dyn AssetFetcher>,
    transcoder: Arc<dyn Transcoder>,
    monitor: Arc<ConnectivityMonitor>,
    event_tx: broadcast::Sender<Event>,
    download: DownloadConfig,
    retry: RetryConfig,
}

impl Scheduler {
    /// Create a scheduler from its collaborators and the run configuration
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        transcoder: Arc<dyn Transcoder>,
        monitor: Arc<ConnectivityMonitor>,
        event_tx: broadcast::Sender<Event>,
        config: &Config,
    ) -> Self {
        Self {
            fetcher,
            transcoder,
            monitor,
            event_tx,
            download: config.download.clone(),
            retry: config.retry.clone(),
        }
    }

    /// Directory that receives the finished files of `batch`
    pub fn output_dir_for(&self, batch: &Batch) -> PathBuf {
        playlist_output_dir(&self.download.output_dir, &batch.name)
    }

    /// Run every item of `batch` with at most `concurrency` items in flight
    ///
    /// Returns one result per item, in batch order. Item failures are recorded in
    /// the results and never abort the batch.
    ///
    /// # Errors
    ///
    /// Fails before any item starts if:
    /// - The batch is empty ([`Error::EmptyBatch`])
    /// - `concurrency` is zero ([`Error::Config`])
    /// - The staging or output directory cannot be created ([`Error::Io`])
    pub async fn run_batch(&self, batch: &Batch, concurrency: usize) -> Result<Vec<ItemResult>> {
        if batch.is_empty() {
            return Err(Error::EmptyBatch);
        }
        if concurrency == 0 {
            return Err(Error::config("concurrency", "must be at least 1"));
        }

        let output_dir = self.output_dir_for(batch);
        tokio::fs::create_dir_all(&self.download.temp_dir).await?;
        tokio::fs::create_dir_all(&output_dir).await?;

        let total = batch.len();
        let stems = assign_output_stems(&batch.items, self.download.collision_policy);
        let pipeline = Arc::new(JobPipeline::new(
            self.fetcher.clone(),
            self.transcoder.clone(),
            self.monitor.clone(),
            self.event_tx.clone(),
            PipelineSettings {
                staging_dir: self.download.temp_dir.clone(),
                output_dir: output_dir.clone(),
                bitrate_kbps: self.download.bitrate_kbps,
                cookies_file: self.download.cookies_file.clone(),
                retry: self.retry.clone(),
            },
        ));
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let tally = Arc::new(Tally::new(total, self.event_tx.clone()));

        tracing::info!(
            batch = %batch.name,
            total,
            concurrency,
            output_dir = %output_dir.display(),
            "Starting batch"
        );
        self.event_tx
            .send(Event::BatchStarted {
                name: batch.name.clone(),
                total,
                concurrency,
            })
            .ok();

        let mut handles = Vec::with_capacity(total);
        for (position, (item, stem)) in batch.items.iter().zip(stems).enumerate() {
            // Acquire a permit before spawning so slots are granted in batch order
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::error!(position, "worker pool closed, remaining items not started");
                    break;
                }
            };

            let pipeline = Arc::clone(&pipeline);
            let tally = Arc::clone(&tally);
            let item = item.clone();
            let event_tx = self.event_tx.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = match AssertUnwindSafe(pipeline.run(&item, position, &stem))
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        tracing::error!(item_id = %item.id, position, %message, "Job panicked");
                        let result =
                            failed_result(&item, position, format!("job panicked: {}", message));
                        // progress at the panic is unknown; a terminal 100 never moves backwards
                        event_tx
                            .send(Event::Progress(ProgressEvent {
                                item_id: item.id.clone(),
                                title: item.title.clone(),
                                phase: Phase::Failed,
                                percent: 100,
                                attempt: 0,
                                error: result.error.clone(),
                            }))
                            .ok();
                        result
                    }
                };
                tally.record(&result).await;
                result
            }));
        }

        let mut results: Vec<Option<ItemResult>> = vec![None; total];
        for (position, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(result) => results[position] = Some(result),
                Err(e) => {
                    tracing::error!(position, error = %e, "Worker task did not complete");
                }
            }
        }

        let mut finished = Vec::with_capacity(total);
        for (position, slot) in results.into_iter().enumerate() {
            let result = match slot {
                Some(result) => result,
                None => {
                    let result = failed_result(
                        &batch.items[position],
                        position,
                        "worker task did not complete".to_string(),
                    );
                    tally.record(&result).await;
                    result
                }
            };
            finished.push(result);
        }

        let (succeeded, failed) = tally.counts().await;
        tracing::info!(batch = %batch.name, succeeded, failed, "Batch finished");
        self.event_tx
            .send(Event::BatchFinished { succeeded, failed })
            .ok();

        Ok(finished)
    }
}

/// Running success/failure counts, announced as items finish
struct Tally {
    total: usize,
    counts: Mutex<(usize, usize)>,
    event_tx: broadcast::Sender<Event>,
}

impl Tally {
    fn new(total: usize, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            total,
            counts: Mutex::new((0, 0)),
            event_tx,
        }
    }

    async fn record(&self, result: &ItemResult) {
        let mut counts = self.counts.lock().await;
        if result.success {
            counts.0 += 1;
        } else {
            counts.1 += 1;
        }
        // sent under the lock so running counts arrive in increasing order
        self.event_tx
            .send(Event::ItemFinished {
                result: result.clone(),
                finished: counts.0 + counts.1,
                succeeded: counts.0,
                failed: counts.1,
                total: self.total,
            })
            .ok();
    }

    async fn counts(&self) -> (usize, usize) {
        *self.counts.lock().await
    }
}

fn failed_result(item: &Item, position: usize, error: String) -> ItemResult {
    ItemResult {
        item_id: item.id.clone(),
        title: item.title.clone(),
        position,
        success: false,
        output_path: None,
        error: Some(error),
        attempts: 0,
        finished_at: Utc::now(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
