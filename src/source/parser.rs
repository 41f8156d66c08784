//! Parsers for yt-dlp playlist listings

use crate::error::SourceError;
use crate::types::{Batch, Item, ItemId};
use serde::Deserialize;

/// Suffix yt-dlp reports on auto-generated artist channels
const TOPIC_SUFFIX: &str = " - Topic";

/// Titles yt-dlp reports for entries that cannot be downloaded
const UNAVAILABLE_TITLES: &[&str] = &["[Private video]", "[Deleted video]"];

#[derive(Debug, Deserialize)]
struct RawPlaylist {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    // None distinguishes a per-item record from a playlist document
    entries: Option<Vec<Option<RawEntry>>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    artist: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
    playlist_title: Option<String>,
    playlist_uploader: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawThumbnail {
    url: String,
    width: Option<u64>,
    height: Option<u64>,
}

/// Parse a yt-dlp flat playlist listing into a [`Batch`]
///
/// Accepts either a single JSON document with an `entries` array or
/// newline-delimited per-item records. Entries without an id and entries reported
/// as private or deleted are skipped.
///
/// # Errors
///
/// Returns [`SourceError::Malformed`] if the text is neither shape and
/// [`SourceError::Empty`] if no downloadable items remain.
pub fn parse_playlist(playlist_id: &str, text: &str) -> Result<Batch, SourceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SourceError::Malformed("no output".to_string()));
    }

    let batch = match serde_json::from_str::<RawPlaylist>(text) {
        Ok(RawPlaylist {
            title,
            uploader,
            channel,
            entries: Some(entries),
        }) => Batch {
            playlist_id: playlist_id.to_string(),
            name: non_empty(title).unwrap_or_else(|| playlist_id.to_string()),
            owner: non_empty(uploader.or(channel)).map(strip_topic),
            items: entries.into_iter().flatten().filter_map(to_item).collect(),
        },
        _ => parse_records(playlist_id, text)?,
    };

    if batch.items.is_empty() {
        return Err(SourceError::Empty {
            playlist: playlist_id.to_string(),
        });
    }
    Ok(batch)
}

fn parse_records(playlist_id: &str, text: &str) -> Result<Batch, SourceError> {
    let mut name = None;
    let mut owner = None;
    let mut items = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut entry: RawEntry = serde_json::from_str(line).map_err(|e| {
            SourceError::Malformed(format!("line {}: {}", line_no + 1, e))
        })?;
        if name.is_none() {
            name = non_empty(entry.playlist_title.take());
        }
        if owner.is_none() {
            owner = non_empty(entry.playlist_uploader.take()).map(strip_topic);
        }
        if let Some(item) = to_item(entry) {
            items.push(item);
        }
    }

    Ok(Batch {
        playlist_id: playlist_id.to_string(),
        name: name.unwrap_or_else(|| playlist_id.to_string()),
        owner,
        items,
    })
}

fn to_item(entry: RawEntry) -> Option<Item> {
    let id = non_empty(entry.id)?;
    let title = non_empty(entry.title).unwrap_or_else(|| id.clone());
    if UNAVAILABLE_TITLES.contains(&title.as_str()) {
        tracing::debug!(item_id = %id, %title, "skipping unavailable playlist entry");
        return None;
    }

    let artist = non_empty(entry.artist.or(entry.uploader).or(entry.channel))
        .map(strip_topic)
        .unwrap_or_default();
    let cover_url = best_thumbnail(entry.thumbnails).or(non_empty(entry.thumbnail));

    Some(Item {
        id: ItemId::new(id),
        title,
        artist,
        duration_secs: entry.duration,
        cover_url,
    })
}

/// Largest thumbnail by pixel area; yt-dlp lists them smallest first, so ties and
/// missing dimensions fall back to the last one
fn best_thumbnail(thumbnails: Vec<RawThumbnail>) -> Option<String> {
    thumbnails
        .into_iter()
        .enumerate()
        .max_by_key(|(index, t)| {
            let area = t.width.unwrap_or(0).saturating_mul(t.height.unwrap_or(0));
            (area, *index)
        })
        .map(|(_, t)| t.url)
}

fn strip_topic(name: String) -> String {
    match name.strip_suffix(TOPIC_SUFFIX) {
        Some(stripped) => stripped.trim_end().to_string(),
        None => name,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Map a failed listing's diagnostic text to a [`SourceError`]
pub fn classify_failure(playlist_id: &str, diagnostic: &str) -> SourceError {
    let lower = diagnostic.to_lowercase();
    let playlist = playlist_id.to_string();

    if lower.contains("does not exist")
        || lower.contains("not found")
        || lower.contains("404")
        || lower.contains("unavailable playlist")
    {
        SourceError::NotFound { playlist }
    } else if lower.contains("private")
        || lower.contains("sign in")
        || lower.contains("login")
        || lower.contains("members-only")
        || lower.contains("cookies")
    {
        SourceError::RequiresAuth { playlist }
    } else {
        SourceError::Failed(diagnostic.trim().to_string())
    }
}
