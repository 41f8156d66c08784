//! Traits for playlist metadata retrieval

use crate::error::SourceError;
use crate::types::Batch;
use async_trait::async_trait;
use std::path::Path;

/// Retrieves the ordered items of a playlist
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Fetch the playlist `playlist_id`, optionally with a cookies file for private lists
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The playlist does not exist ([`SourceError::NotFound`])
    /// - The playlist is private and no usable credentials were given
    ///   ([`SourceError::RequiresAuth`])
    /// - The playlist has no downloadable items ([`SourceError::Empty`])
    /// - The source output could not be parsed ([`SourceError::Malformed`])
    async fn fetch_batch(
        &self,
        playlist_id: &str,
        cookies_file: Option<&Path>,
    ) -> Result<Batch, SourceError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
