//! Traits and types for asset retrieval

use crate::error::FetchError;
use crate::types::ItemId;
use async_trait::async_trait;
use std::path::PathBuf;

/// What to fetch and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Item to retrieve
    pub item_id: ItemId,
    /// Staging file the raw audio is written to
    pub destination: PathBuf,
    /// Opaque credentials file passed through to the retrieval tool
    pub cookies_file: Option<PathBuf>,
}

impl FetchRequest {
    /// Request without credentials
    pub fn new(item_id: ItemId, destination: PathBuf) -> Self {
        Self {
            item_id,
            destination,
            cookies_file: None,
        }
    }

    /// Attach a cookies file
    pub fn with_cookies(mut self, cookies_file: Option<PathBuf>) -> Self {
        self.cookies_file = cookies_file;
        self
    }
}

/// Retrieves the raw audio of one item
///
/// A failed fetch may leave a partial file at the destination. Implementations
/// must not retry on their own.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Retrieve `request.item_id` into `request.destination`
    ///
    /// Returns the path of the written file on success.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] holding the raw diagnostic text of the failure.
    async fn fetch(&self, request: &FetchRequest) -> Result<PathBuf, FetchError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
