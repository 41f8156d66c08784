//! Core types for playlist-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// External identifier of a playlist item (e.g. a video id)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of media to download
///
/// Created once when the batch is fetched and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// External identifier
    pub id: ItemId,
    /// Display title
    pub title: String,
    /// Attributed creator name
    pub artist: String,
    /// Nominal duration in seconds, if the source reports one
    pub duration_secs: Option<f64>,
    /// Cover image URL, if any
    pub cover_url: Option<String>,
}

/// An ordered collection of items plus display metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Playlist identifier the batch was built from
    pub playlist_id: String,
    /// Display name of the playlist
    pub name: String,
    /// Attributed owner of the playlist
    pub owner: Option<String>,
    /// Items in playlist order
    pub items: Vec<Item>,
}

impl Batch {
    /// Number of items in the batch
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Phase of a single job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Waiting for a worker slot
    Pending,
    /// Retrieving the raw asset (including connectivity waits and retries)
    Fetching,
    /// Converting the raw asset to the target format
    Converting,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl Phase {
    /// Whether no further transitions can happen from this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// Progress indicator reported when entering this phase
    ///
    /// `Failed` has no fixed value: a failure keeps the last reached progress.
    pub fn percent(&self) -> Option<u8> {
        match self {
            Phase::Pending | Phase::Fetching => Some(0),
            Phase::Converting => Some(50),
            Phase::Completed => Some(100),
            Phase::Failed => None,
        }
    }

    fn can_transition_to(&self, next: Phase) -> bool {
        match (self, next) {
            (Phase::Pending, Phase::Fetching) => true,
            (Phase::Fetching, Phase::Converting) => true,
            (Phase::Converting, Phase::Completed) => true,
            (from, Phase::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Pending => "pending",
            Phase::Fetching => "fetching",
            Phase::Converting => "converting",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Mutable per-item state, owned by the worker running the item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobState {
    /// Current phase
    pub phase: Phase,
    /// Number of fetch attempts made so far
    pub attempts: u32,
    /// Last error observed, if any
    pub last_error: Option<String>,
    /// Progress reported so far (never decreases)
    pub percent: u8,
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

impl JobState {
    /// Create a job state in the `Pending` phase
    pub fn new() -> Self {
        Self {
            phase: Phase::Pending,
            attempts: 0,
            last_error: None,
            percent: 0,
        }
    }

    /// Move to `next`, returning false if the transition is not allowed
    pub fn advance(&mut self, next: Phase) -> bool {
        if !self.phase.can_transition_to(next) {
            return false;
        }
        self.phase = next;
        if let Some(p) = next.percent() {
            self.percent = self.percent.max(p);
        }
        true
    }

    /// Move to `Failed` and record the error
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        let error = error.into();
        if !self.advance(Phase::Failed) {
            return false;
        }
        self.last_error = Some(error);
        true
    }
}

/// Progress notification for a single item
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Item identifier
    pub item_id: ItemId,
    /// Item display title
    pub title: String,
    /// Phase just entered
    pub phase: Phase,
    /// Progress indicator (0..=100, non-decreasing per item)
    pub percent: u8,
    /// Fetch attempts made so far
    pub attempt: u32,
    /// Error text for `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final outcome of one item
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemResult {
    /// Item identifier
    pub item_id: ItemId,
    /// Item display title
    pub title: String,
    /// Position of the item in its batch
    pub position: usize,
    /// Whether the item completed
    pub success: bool,
    /// Path of the finished file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Error text for failed items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Fetch attempts used
    pub attempts: u32,
    /// When the item reached its terminal phase
    pub finished_at: DateTime<Utc>,
}

/// Summary of an archive written after a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    /// Path of the archive file
    pub path: PathBuf,
    /// Number of entries written
    pub entry_count: usize,
    /// Size of the archive on disk in bytes
    pub compressed_size: u64,
}

/// Event emitted during a run
///
/// Events are broadcast fire-and-forget; a run behaves identically whether or not
/// anyone is subscribed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch was admitted to the scheduler
    BatchStarted {
        /// Batch display name
        name: String,
        /// Number of items
        total: usize,
        /// Worker pool size
        concurrency: usize,
    },

    /// An item changed phase
    Progress(ProgressEvent),

    /// A fetch failed with a network error and will be retried
    RetryScheduled {
        /// Item identifier
        item_id: ItemId,
        /// Attempt that just failed
        attempt: u32,
        /// Total attempts allowed
        max_attempts: u32,
        /// Error text of the failed attempt
        error: String,
    },

    /// Connectivity probe started failing
    ConnectivityLost,

    /// Connectivity probe succeeded again after failing
    ConnectivityRestored {
        /// How long the network was considered offline, in seconds
        offline_secs: u64,
    },

    /// An item reached a terminal phase
    ItemFinished {
        /// The item's result
        result: ItemResult,
        /// Items finished so far (including this one)
        finished: usize,
        /// Successful items so far
        succeeded: usize,
        /// Failed items so far
        failed: usize,
        /// Items in the batch
        total: usize,
    },

    /// Every item reached a terminal phase
    BatchFinished {
        /// Successful items
        succeeded: usize,
        /// Failed items
        failed: usize,
    },

    /// Writing tags to a finished file failed (non-fatal)
    TagFailed {
        /// Item identifier
        item_id: ItemId,
        /// Error text
        error: String,
    },

    /// The output archive was written
    Archived(ArchiveSummary),
}

/// Outcome of a complete run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// Batch display name
    pub batch_name: String,
    /// Directory holding the finished files
    pub output_dir: PathBuf,
    /// One result per batch item, in batch order
    pub results: Vec<ItemResult>,
    /// Number of finished files whose tags could not be written
    pub tag_failures: usize,
    /// Archive written after the run, if archiving was enabled
    pub archive: Option<ArchiveSummary>,
}

impl RunReport {
    /// Number of successful items
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Number of failed items
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Failed items with their reasons, in batch order
    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Process exit code: 0 when at least one item succeeded, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.succeeded() > 0 { 0 } else { 1 }
    }
}
