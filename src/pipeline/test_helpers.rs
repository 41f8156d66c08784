//! Shared stubs for pipeline, scheduler and downloader tests

use crate::config::{ConnectivityConfig, RetryConfig};
use crate::connectivity::{ConnectivityMonitor, ConnectivityProbe};
use crate::error::{FetchError, TranscodeError};
use crate::fetcher::{AssetFetcher, FetchRequest};
use crate::transcoder::Transcoder;
use crate::types::{Item, ItemId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Item with predictable metadata
pub(crate) fn item(id: &str, artist: &str, title: &str) -> Item {
    Item {
        id: ItemId::new(id),
        title: title.to_string(),
        artist: artist.to_string(),
        duration_secs: Some(180.0),
        cover_url: None,
    }
}

/// Retry settings with millisecond backoff
pub(crate) fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 4,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Probe that replays a script, then stays at its last answer
pub(crate) struct ScriptedProbe {
    script: Mutex<VecDeque<bool>>,
    fallback: AtomicBool,
    pub(crate) calls: AtomicUsize,
}

impl ScriptedProbe {
    pub(crate) fn new(script: &[bool]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            fallback: AtomicBool::new(*script.last().unwrap_or(&true)),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn online() -> Arc<Self> {
        Self::new(&[true])
    }
}

#[async_trait]
impl ConnectivityProbe for ScriptedProbe {
    async fn probe(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.load(Ordering::SeqCst))
    }
}

/// Monitor around `probe` that polls every few milliseconds
pub(crate) fn monitor(
    probe: Arc<ScriptedProbe>,
    offline_timeout: Option<Duration>,
) -> Arc<ConnectivityMonitor> {
    let config = ConnectivityConfig {
        poll_interval: Duration::from_millis(2),
        offline_timeout,
        ..ConnectivityConfig::default()
    };
    Arc::new(ConnectivityMonitor::new(probe, &config))
}

/// Fetcher whose per-item failures are scripted; unscripted attempts succeed
///
/// Successful fetches write a small file to the request destination. Tracks how
/// many fetches run at once.
#[derive(Default)]
pub(crate) struct StubFetcher {
    failures: Mutex<HashMap<ItemId, VecDeque<String>>>,
    calls: Mutex<HashMap<ItemId, u32>>,
    delay: Duration,
    active: AtomicUsize,
    pub(crate) max_active: AtomicUsize,
    panic_on: Option<ItemId>,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every fetch take `delay`
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next attempts of `id` with these diagnostics, in order
    pub(crate) fn failing(self, id: &str, diagnostics: &[&str]) -> Self {
        self.failures.lock().unwrap().insert(
            ItemId::new(id),
            diagnostics.iter().map(|d| d.to_string()).collect(),
        );
        self
    }

    /// Panic when asked to fetch `id`
    pub(crate) fn panicking_on(mut self, id: &str) -> Self {
        self.panic_on = Some(ItemId::new(id));
        self
    }

    /// Number of fetch calls made for `id`
    pub(crate) fn calls(&self, id: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&ItemId::new(id))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl AssetFetcher for StubFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<PathBuf, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.item_id.clone())
            .or_insert(0) += 1;

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on.as_ref() == Some(&request.item_id) {
            panic!("stub fetcher exploded on {}", request.item_id);
        }

        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&request.item_id)
            .and_then(|queue| queue.pop_front());
        if let Some(diagnostic) = failure {
            return Err(FetchError::with_exit_code(diagnostic, Some(1)));
        }

        tokio::fs::write(&request.destination, request.item_id.as_str())
            .await
            .map_err(|e| FetchError::new(e.to_string()))?;
        Ok(request.destination.clone())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Transcoder that copies input to output and removes the input, failing for
/// chosen output stems
#[derive(Default)]
pub(crate) struct StubTranscoder {
    failing_stems: HashSet<String>,
    pub(crate) calls: AtomicUsize,
}

impl StubTranscoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail conversions whose output file stem is `stem`
    pub(crate) fn failing_for(mut self, stem: &str) -> Self {
        self.failing_stems.insert(stem.to_string());
        self
    }
}

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        _bitrate_kbps: u32,
    ) -> Result<(), TranscodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let data = tokio::fs::read(input)
            .await
            .map_err(|_| TranscodeError::InputMissing(input.to_path_buf()))?;
        tokio::fs::remove_file(input).await.ok();

        if self.failing_stems.contains(&stem) {
            return Err(TranscodeError::Failed {
                exit_code: Some(1),
                diagnostic: "Invalid data found when processing input".to_string(),
            });
        }
        tokio::fs::write(output, data)
            .await
            .map_err(|e| TranscodeError::Spawn(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
