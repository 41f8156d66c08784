//! ID3 tagging of finished files
//!
//! Tags are written after a batch finishes. A cover image that cannot be downloaded
//! only costs the file its artwork; a tag that cannot be written is reported to the
//! caller, who counts it without failing the item.

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::download_with_retry;
use crate::types::Item;
use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Version};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cover images larger than this are not embedded
const MAX_COVER_BYTES: usize = 10 * 1024 * 1024;

/// Writes ID3v2.4 tags and embeds cover art
pub struct MetadataTagger {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl MetadataTagger {
    /// Create a tagger whose cover downloads give up after `cover_timeout`
    pub fn new(cover_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(cover_timeout).build()?;
        Ok(Self {
            client,
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(2),
                backoff_multiplier: 2.0,
                jitter: true,
            },
        })
    }

    /// Write title, artist, album and track number to `path`, plus the item's cover
    /// as the front cover picture when one is available
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tagging`] if the tag cannot be written. Cover download
    /// failures are logged and never returned.
    pub async fn tag_file(&self, path: &Path, item: &Item, album: &str, track: u32) -> Result<()> {
        let cover = match &item.cover_url {
            Some(url) => self.fetch_cover(url).await,
            None => None,
        };

        let mut tag = Tag::new();
        tag.set_title(item.title.clone());
        if !item.artist.is_empty() {
            tag.set_artist(item.artist.clone());
        }
        tag.set_album(album);
        tag.set_track(track);
        if let Some((data, mime_type)) = cover {
            tag.add_frame(Picture {
                mime_type,
                picture_type: PictureType::CoverFront,
                description: "Cover".to_string(),
                data,
            });
        }

        let target: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || tag.write_to_path(&target, Version::Id3v24))
            .await
            .map_err(|e| Error::Tagging {
                path: path.to_path_buf(),
                reason: format!("tagging task failed: {}", e),
            })?
            .map_err(|e| Error::Tagging {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        tracing::debug!(path = %path.display(), track, "tags written");
        Ok(())
    }

    /// Download cover art, returning the bytes and their MIME type
    async fn fetch_cover(&self, url: &str) -> Option<(Vec<u8>, String)> {
        let result = download_with_retry(&self.retry, || async {
            let response = self.client.get(url).send().await?.error_for_status()?;
            let header_mime = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
            let bytes = response.bytes().await?;
            Ok::<_, Error>((bytes.to_vec(), header_mime))
        })
        .await;

        match result {
            Ok((data, _)) if data.is_empty() || data.len() > MAX_COVER_BYTES => {
                tracing::warn!(url, bytes = data.len(), "skipping cover art with unusable size");
                None
            }
            Ok((data, header_mime)) => {
                let mime = header_mime
                    .filter(|m| m.starts_with("image/"))
                    .unwrap_or_else(|| sniff_image_mime(&data).to_string());
                Some((data, mime))
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "cover art download failed, tagging without it");
                None
            }
        }
    }
}

/// Guess an image MIME type from its leading bytes
fn sniff_image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}
