//! # playlist-dl
//!
//! Concurrent playlist downloader: fetch every track of a playlist, convert it to a
//! 320 kbps MP3, tag it and bundle the result into a ZIP archive.
//!
//! ## Design Philosophy
//!
//! playlist-dl is designed to be:
//! - **Resilient** - Network failures are retried, and outages pause work instead of burning retries
//! - **Isolated** - One broken track never takes the rest of the playlist down with it
//! - **Pluggable** - Retrieval, conversion and connectivity checks sit behind traits
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! External work is delegated to `yt-dlp` (playlist listing and audio retrieval)
//! and `ffmpeg` (MP3 encoding), both located on `PATH` unless configured explicitly.
//!
//! ## Quick Start
//!
//! ```no_run
//! use playlist_dl::{Config, PlaylistDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.download.output_dir = "music".into();
//!     config.download.concurrency = 3;
//!
//!     let downloader = PlaylistDownloader::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = downloader
//!         .run("https://www.youtube.com/playlist?list=PLx0sYbCqOb8TBPRdmBHs5Iftvv9TPboYG")
//!         .await?;
//!     println!("{} of {} tracks saved", report.succeeded(), report.results.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// ZIP archive creation
pub mod archive;
/// Configuration types
pub mod config;
/// Network reachability monitoring
pub mod connectivity;
/// Top-level playlist downloader
pub mod downloader;
/// Error types
pub mod error;
/// Raw audio retrieval
pub mod fetcher;
/// Per-item fetch and convert pipeline
pub mod pipeline;
/// Bounded subprocess execution
pub mod process;
/// Retry logic with exponential backoff
pub mod retry;
/// Bounded-concurrency batch scheduler
pub mod scheduler;
/// Playlist metadata retrieval
pub mod source;
/// ID3 tagging
pub mod tagging;
/// Audio conversion
pub mod transcoder;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{CollisionPolicy, Config};
pub use downloader::{Components, PlaylistDownloader};
pub use error::{Error, FetchError, Result, SourceError, TranscodeError};
pub use types::{
    ArchiveSummary, Batch, Event, Item, ItemId, ItemResult, Phase, ProgressEvent, RunReport,
};
