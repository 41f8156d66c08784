//! In-process stand-ins for the external collaborators of a run

use async_trait::async_trait;
use playlist_dl::config::{ConnectivityConfig, RetryConfig};
use playlist_dl::connectivity::{ConnectivityMonitor, ConnectivityProbe};
use playlist_dl::fetcher::{AssetFetcher, FetchRequest};
use playlist_dl::source::PlaylistSource;
use playlist_dl::transcoder::Transcoder;
use playlist_dl::{Batch, FetchError, Item, ItemId, SourceError, TranscodeError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Item with an `Artist`/`Title` pair derived from its id
pub fn item(id: &str) -> Item {
    Item {
        id: ItemId::new(id),
        title: format!("Title {id}"),
        artist: "Artist".to_string(),
        duration_secs: Some(200.0),
        cover_url: None,
    }
}

/// Batch named `Scenario` with one item per id
pub fn batch(ids: &[&str]) -> Batch {
    Batch {
        playlist_id: "PLscenario01".to_string(),
        name: "Scenario".to_string(),
        owner: None,
        items: ids.iter().map(|id| item(id)).collect(),
    }
}

/// Retry settings that keep the full attempt budget but back off for milliseconds
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 4,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Probe that answers from a script, repeating its last answer once exhausted
pub struct ScriptedProbe {
    script: Mutex<VecDeque<bool>>,
    last: bool,
    pub calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(script: &[bool]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            last: script.last().copied().unwrap_or(true),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn online() -> Arc<Self> {
        Self::new(&[true])
    }
}

#[async_trait]
impl ConnectivityProbe for ScriptedProbe {
    async fn probe(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or(self.last)
    }
}

/// Monitor around `probe` polling every couple of milliseconds
pub fn monitor(probe: Arc<ScriptedProbe>) -> ConnectivityMonitor {
    let config = ConnectivityConfig {
        poll_interval: Duration::from_millis(2),
        ..ConnectivityConfig::default()
    };
    ConnectivityMonitor::new(probe, &config)
}

/// Fetcher that writes `<id>:<attempt>` to the destination, failing scripted attempts
#[derive(Default)]
pub struct StubFetcher {
    failures: Mutex<HashMap<ItemId, VecDeque<String>>>,
    calls: Mutex<HashMap<ItemId, u32>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    delay: Duration,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next attempts of `id` with these diagnostics
    pub fn failing(self, id: &str, diagnostics: &[&str]) -> Self {
        self.failures.lock().unwrap().insert(
            ItemId::new(id),
            diagnostics.iter().map(|d| d.to_string()).collect(),
        );
        self
    }

    pub fn calls(&self, id: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&ItemId::new(id))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl AssetFetcher for StubFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<PathBuf, FetchError> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(request.item_id.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let scripted = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&request.item_id)
            .and_then(VecDeque::pop_front);
        if let Some(diagnostic) = scripted {
            return Err(FetchError::with_exit_code(diagnostic, Some(1)));
        }

        tokio::fs::write(
            &request.destination,
            format!("{}:{}", request.item_id, attempt),
        )
        .await
        .map_err(|e| FetchError::new(e.to_string()))?;
        Ok(request.destination.clone())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Transcoder that moves input to output, failing for chosen item ids
///
/// The item id is recovered from the fetched content written by [`StubFetcher`].
#[derive(Default)]
pub struct StubTranscoder {
    failing_ids: HashSet<String>,
    pub calls: AtomicUsize,
}

impl StubTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, id: &str) -> Self {
        self.failing_ids.insert(id.to_string());
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
        let data = tokio::fs::read(input)
            .await
            .map_err(|_| TranscodeError::InputMissing(input.to_path_buf()))?;
        tokio::fs::remove_file(input).await.ok();

        let content = String::from_utf8_lossy(&data);
        let id = content.split(':').next().unwrap_or_default();
        if self.failing_ids.contains(id) {
            return Err(TranscodeError::Failed {
                exit_code: Some(1),
                diagnostic: format!("{id}: Invalid data found when processing input"),
            });
        }
        tokio::fs::write(output, &data)
            .await
            .map_err(|e| TranscodeError::Spawn(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Source that always serves the same batch
pub struct StubSource {
    pub batch: Batch,
}

#[async_trait]
impl PlaylistSource for StubSource {
    async fn fetch_batch(
        &self,
        _playlist_id: &str,
        _cookies_file: Option<&Path>,
    ) -> Result<Batch, SourceError> {
        Ok(self.batch.clone())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
