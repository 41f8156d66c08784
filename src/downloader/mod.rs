//! Top-level downloader split into focused submodules.
//!
//! [`PlaylistDownloader`] owns the collaborators of a run and drives it end to end:
//! validate the input, fetch the batch, schedule every item, then post-process the
//! finished files.
//! - [`post_process`] - Tagging, archiving and staging cleanup after a batch

mod post_process;


use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, ConnectivityProbe, HttpConnectivityProbe};
use crate::error::{Error, Result};
use crate::fetcher::{AssetFetcher, YtDlpFetcher};
use crate::scheduler::Scheduler;
use crate::source::{PlaylistSource, YtDlpPlaylistSource, extract_playlist_id};
use crate::tagging::MetadataTagger;
use crate::transcoder::{FfmpegTranscoder, Transcoder};
use crate::types::{Batch, Event, RunReport};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the event channel; slow subscribers miss the oldest events
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Collaborators a [`PlaylistDownloader`] runs with
///
/// [`PlaylistDownloader::new`] builds the subprocess and HTTP implementations;
/// [`PlaylistDownloader::with_components`] accepts any implementations, which is
/// how tests substitute stubs.
pub struct Components {
    /// Playlist metadata retrieval
    pub source: Arc<dyn PlaylistSource>,
    /// Raw asset retrieval
    pub fetcher: Arc<dyn AssetFetcher>,
    /// Audio conversion
    pub transcoder: Arc<dyn Transcoder>,
    /// Reachability check gating fetch attempts
    pub probe: Arc<dyn ConnectivityProbe>,
}

/// Downloads a playlist into a directory of tagged MP3 files
pub struct PlaylistDownloader {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    pub(crate) source: Arc<dyn PlaylistSource>,
    pub(crate) scheduler: Scheduler,
    /// Present only when metadata writing is enabled
    pub(crate) tagger: Option<MetadataTagger>,
}

impl PlaylistDownloader {
    /// Create a downloader that shells out to `yt-dlp` and `ffmpeg`
    ///
    /// Binaries come from `tools.yt_dlp_path`/`tools.ffmpeg_path` when set, otherwise
    /// from `PATH` if `tools.search_path` is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid ([`Error::Config`])
    /// - A required binary cannot be located ([`Error::NotSupported`])
    /// - The HTTP client for the connectivity probe or cover art cannot be built
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let search_path = config.tools.search_path;
        let yt_dlp = locate_binary("yt-dlp", config.tools.yt_dlp_path.as_ref(), search_path)?;
        let ffmpeg = locate_binary("ffmpeg", config.tools.ffmpeg_path.as_ref(), search_path)?;

        let source = YtDlpPlaylistSource::new(yt_dlp.clone()).with_limits(&config.tools);
        let fetcher = YtDlpFetcher::new(yt_dlp).with_limits(&config.tools);
        let transcoder = FfmpegTranscoder::new(ffmpeg).with_limits(&config.tools);
        let probe = HttpConnectivityProbe::from_config(&config.connectivity)?;

        tracing::info!(
            source = source.name(),
            fetcher = fetcher.name(),
            transcoder = transcoder.name(),
            "external tools initialized"
        );

        Self::with_components(
            config,
            Components {
                source: Arc::new(source),
                fetcher: Arc::new(fetcher),
                transcoder: Arc::new(transcoder),
                probe: Arc::new(probe),
            },
        )
    }

    /// Create a downloader from explicit collaborators
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid, or an error if
    /// the cover art HTTP client cannot be built.
    pub fn with_components(config: Config, components: Components) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let monitor = Arc::new(
            ConnectivityMonitor::new(components.probe, &config.connectivity)
                .with_events(event_tx.clone()),
        );
        let scheduler = Scheduler::new(
            components.fetcher,
            components.transcoder,
            monitor,
            event_tx.clone(),
            &config,
        );
        let tagger = if config.post_process.write_metadata {
            Some(MetadataTagger::new(config.post_process.cover_timeout)?)
        } else {
            None
        };

        Ok(Self {
            event_tx,
            config: Arc::new(config),
            source: components.source,
            scheduler,
            tagger,
        })
    }

    /// Subscribe to run events
    ///
    /// Multiple subscribers are supported. Events emitted before subscribing are
    /// not replayed, so subscribe before calling [`run`](Self::run).
    ///
    /// # Example
    ///
    /// ```no_run
    /// use playlist_dl::{Config, PlaylistDownloader};
    /// use playlist_dl::types::Event;
    ///
    /// # async fn example() -> playlist_dl::Result<()> {
    /// let downloader = PlaylistDownloader::new(Config::default())?;
    /// let mut events = downloader.subscribe();
    ///
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         if let Event::ItemFinished { finished, total, .. } = event {
    ///             println!("{finished}/{total}");
    ///         }
    ///     }
    /// });
    ///
    /// let report = downloader
    ///     .run("https://www.youtube.com/playlist?list=PLx0sYbCqOb8TBPRdmBHs5Iftvv9TPboYG")
    ///     .await?;
    /// std::process::exit(report.exit_code());
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the configuration this downloader runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Download the playlist named by `input` (a playlist URL or bare identifier)
    ///
    /// # Errors
    ///
    /// Fails without downloading anything if the input is not a playlist
    /// ([`Error::InvalidUrl`]), the playlist cannot be retrieved ([`Error::Source`]),
    /// or the batch cannot be started (see [`run_batch`](Self::run_batch)).
    /// Individual item failures are reported in the returned [`RunReport`].
    pub async fn run(&self, input: &str) -> Result<RunReport> {
        let playlist_id = extract_playlist_id(input)?;
        let batch = self
            .source
            .fetch_batch(&playlist_id, self.config.download.cookies_file.as_deref())
            .await?;

        self.run_batch(&batch).await
    }

    /// Download an already fetched batch and post-process the results
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyBatch`] for a batch without items and [`Error::Io`]
    /// if the staging or output directory cannot be created.
    pub async fn run_batch(&self, batch: &Batch) -> Result<RunReport> {
        let staging_existed = tokio::fs::try_exists(&self.config.download.temp_dir)
            .await
            .unwrap_or(true);
        let results = self
            .scheduler
            .run_batch(batch, self.config.download.concurrency)
            .await?;
        let output_dir = self.scheduler.output_dir_for(batch);

        let tag_failures = self.tag_results(batch, &results).await;
        let succeeded = results.iter().filter(|r| r.success).count();
        let archive = if self.config.post_process.create_archive && succeeded > 0 {
            self.archive_output(&output_dir).await
        } else {
            None
        };
        if !staging_existed {
            self.cleanup_staging().await;
        }

        Ok(RunReport {
            batch_name: batch.name.clone(),
            output_dir,
            results,
            tag_failures,
            archive,
        })
    }
}

/// Resolve an external binary from an explicit path or `PATH`
fn locate_binary(tool: &str, explicit: Option<&PathBuf>, search_path: bool) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.clone());
    }
    if !search_path {
        return Err(Error::NotSupported(format!(
            "{} path not configured and PATH search is disabled",
            tool
        )));
    }
    which::which(tool).map_err(|_| Error::NotSupported(format!("{} not found in PATH", tool)))
}
