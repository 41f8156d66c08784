//! Traits for audio conversion

use crate::error::TranscodeError;
use async_trait::async_trait;
use std::path::Path;

/// Converts a raw audio file to a constant-bitrate MP3
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input` into `output` at `bitrate_kbps`
    ///
    /// An existing `output` is overwritten. The input file is deleted on success;
    /// on failure its deletion is attempted before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `input` does not exist
    /// - The conversion engine cannot be started or exits unsuccessfully
    /// - Conversion does not finish within the configured timeout
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        bitrate_kbps: u32,
    ) -> Result<(), TranscodeError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
