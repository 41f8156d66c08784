//! Playlist metadata retrieval
//!
//! A [`PlaylistSource`] turns a playlist identifier into a [`Batch`](crate::types::Batch).
//! [`YtDlpPlaylistSource`] asks `yt-dlp` for a flat listing and hands its output to
//! [`parse_playlist`], which accepts both output shapes yt-dlp can produce:
//!
//! - a single JSON document with an `entries` array (`-J`)
//! - one JSON record per line, each carrying `playlist_title`/`playlist_uploader` (`-j`)
//!
//! [`extract_playlist_id`] validates user input before any of this runs.

mod cli;
mod parser;
mod playlist_id;
mod traits;

pub use cli::YtDlpPlaylistSource;
pub use parser::{classify_failure, parse_playlist};
pub use playlist_id::extract_playlist_id;
pub use traits::PlaylistSource;
