//! Raw audio retrieval
//!
//! The [`AssetFetcher`] trait retrieves the audio of a single item into a staging
//! file. Failures carry the tool's raw diagnostic text; deciding whether a failure is
//! worth retrying is left to the job pipeline.
//!
//! - [`YtDlpFetcher`]: runs the external `yt-dlp` binary
//!
//! ```no_run
//! use playlist_dl::fetcher::{AssetFetcher, FetchRequest, YtDlpFetcher};
//! use playlist_dl::types::ItemId;
//! use std::path::PathBuf;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = YtDlpFetcher::from_path().expect("yt-dlp not found in PATH");
//! let request = FetchRequest::new(ItemId::new("dQw4w9WgXcQ"), PathBuf::from("temp/dQw4w9WgXcQ.audio"));
//! let raw = fetcher.fetch(&request).await?;
//! println!("fetched {}", raw.display());
//! # Ok(())
//! # }
//! ```

mod cli;
mod traits;

pub use cli::YtDlpFetcher;
pub use traits::{AssetFetcher, FetchRequest};
