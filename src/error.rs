//! Error types for playlist-dl
//!
//! This module provides error handling for the library, including:
//! - The crate-wide [`Error`] type used by every fallible public operation
//! - Collaborator-specific error types (playlist source, fetcher, transcoder)
//! - Classification helpers used to decide whether an error ends the whole run

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for playlist-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for playlist-dl
///
/// Per-item failures never surface through this type from the scheduler: they are
/// caught at the job pipeline boundary and turned into [`crate::types::ItemResult`]s.
/// The variants that do escape a run are validation, source and infrastructure errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// The playlist URL or identifier could not be understood
    #[error("invalid playlist URL: {0}")]
    InvalidUrl(String),

    /// Playlist metadata retrieval failed
    #[error("playlist source error: {0}")]
    Source(#[from] SourceError),

    /// A batch with no items was submitted for scheduling
    #[error("empty batch: nothing to download")]
    EmptyBatch,

    /// Network connectivity did not return within the configured offline timeout
    #[error("network offline for longer than {waited_secs}s")]
    Offline {
        /// How long the monitor waited before giving up, in seconds
        waited_secs: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error (connectivity probe, cover art download)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Asset retrieval failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Audio conversion failed
    #[error("transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// Writing ID3 tags failed
    #[error("tagging error for {path}: {reason}")]
    Tagging {
        /// The file that could not be tagged
        path: PathBuf,
        /// The reason tagging failed
        reason: String,
    },

    /// Archive creation failed
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// External tool execution failed (yt-dlp, ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error happened before any per-item work could start
    ///
    /// Pre-flight failures (bad input, unreadable playlist, empty batch, bad
    /// configuration) are reported differently by the CLI than failures that
    /// interrupt a run.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Error::Config { .. } | Error::InvalidUrl(_) | Error::Source(_) | Error::EmptyBatch
        )
    }
}

/// Playlist source errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The playlist does not exist
    #[error("playlist {playlist} not found")]
    NotFound {
        /// The playlist identifier that was requested
        playlist: String,
    },

    /// The playlist is private and requires credentials
    #[error("playlist {playlist} is private; a cookies file is required")]
    RequiresAuth {
        /// The playlist identifier that was requested
        playlist: String,
    },

    /// The playlist exists but contains no downloadable items
    #[error("playlist {playlist} contains no items")]
    Empty {
        /// The playlist identifier that was requested
        playlist: String,
    },

    /// The source returned output that could not be parsed
    #[error("malformed playlist data: {0}")]
    Malformed(String),

    /// The source tool failed for a reason that is not classified above
    #[error("playlist retrieval failed: {0}")]
    Failed(String),
}

/// Asset retrieval failure
///
/// Carries the raw diagnostic text reported by the retrieval tool. The fetcher does
/// not interpret it; the job pipeline classifies it (see [`crate::retry`]).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{diagnostic}")]
pub struct FetchError {
    /// Raw diagnostic text (usually the tool's stderr)
    pub diagnostic: String,
    /// Process exit code, if the process ran to completion
    pub exit_code: Option<i32>,
}

impl FetchError {
    /// Create a fetch error from diagnostic text without an exit code
    pub fn new(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: diagnostic.into(),
            exit_code: None,
        }
    }

    /// Create a fetch error from diagnostic text and an exit code
    pub fn with_exit_code(diagnostic: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            diagnostic: diagnostic.into(),
            exit_code,
        }
    }
}

/// Audio conversion failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranscodeError {
    /// The input file does not exist
    #[error("input file {0} not found")]
    InputMissing(PathBuf),

    /// The conversion engine could not be started
    #[error("failed to start transcoder: {0}")]
    Spawn(String),

    /// The conversion engine ran and reported a failure
    #[error("transcoder exited with code {exit_code:?}: {diagnostic}")]
    Failed {
        /// Process exit code, if any
        exit_code: Option<i32>,
        /// Diagnostic text from the engine
        diagnostic: String,
    },

    /// The conversion did not finish within the configured timeout
    #[error("transcoder timed out after {0}s")]
    TimedOut(u64),
}
