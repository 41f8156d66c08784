//! Utility functions for output naming and path manipulation

use crate::config::CollisionPolicy;
use crate::types::Item;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Maximum length of a sanitized file stem, in bytes
const MAX_STEM_BYTES: usize = 180;

/// Maximum number of rename attempts when resolving entry name collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Stem used when sanitizing leaves nothing behind
const FALLBACK_STEM: &str = "untitled";

/// Device names Windows refuses as file stems
const RESERVED_STEMS: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Make a string safe to use as a file stem on every major platform
///
/// Removes path separators, characters reserved on Windows and control characters,
/// collapses runs of whitespace, trims leading/trailing dots and spaces and caps the
/// length. Never returns an empty string.
///
/// # Examples
///
/// ```
/// use playlist_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("AC/DC: Back  in Black?"), "ACDC Back in Black");
/// assert_eq!(sanitize_filename("..."), "untitled");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c == ' ');

    let mut stem = truncate_at_char_boundary(trimmed, MAX_STEM_BYTES)
        .trim_end_matches(|c: char| c == '.' || c == ' ')
        .to_string();

    if stem.is_empty() {
        return FALLBACK_STEM.to_string();
    }
    if RESERVED_STEMS.contains(&stem.to_lowercase().as_str()) {
        stem.insert(0, '_');
    }
    stem
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Sanitized `"<artist> - <title>"` stem for an item
///
/// Falls back to the title alone when the item has no artist.
#[must_use]
pub fn output_stem(item: &Item) -> String {
    let artist = item.artist.trim();
    if artist.is_empty() {
        sanitize_filename(&item.title)
    } else {
        sanitize_filename(&format!("{} - {}", artist, item.title))
    }
}

/// Compute the output stem of every item in a batch
///
/// With [`CollisionPolicy::AppendId`], the first item keeps its plain stem and every
/// later item whose stem collides (case-insensitively) gets ` [<item id>]` appended,
/// plus ` (2)`, ` (3)`, ... if the same id repeats. The suffix is never lost to length
/// truncation, so every returned stem is distinct. With [`CollisionPolicy::Overwrite`],
/// plain stems are returned unchanged, so colliding items share an output path.
///
/// The result is deterministic for a given batch, so re-running a batch targets the
/// same paths.
#[must_use]
pub fn assign_output_stems(items: &[Item], policy: CollisionPolicy) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .map(|item| {
            let stem = output_stem(item);
            match policy {
                CollisionPolicy::Overwrite => stem,
                CollisionPolicy::AppendId => {
                    if seen.insert(stem.to_lowercase()) {
                        stem
                    } else {
                        disambiguate(&stem, item.id.as_str(), &mut seen)
                    }
                }
            }
        })
        .collect()
}

/// First ` [id]` / ` [id] (n)` variant of `stem` not yet in `seen`, recorded as taken
fn disambiguate(stem: &str, id: &str, seen: &mut HashSet<String>) -> String {
    let id = sanitize_filename(id);
    for n in 1..=MAX_RENAME_ATTEMPTS {
        let suffix = if n == 1 {
            format!(" [{}]", id)
        } else {
            format!(" [{}] ({})", id, n)
        };
        let base = truncate_at_char_boundary(stem, MAX_STEM_BYTES.saturating_sub(suffix.len()))
            .trim_end_matches(|c: char| c == '.' || c == ' ');
        let candidate = format!("{}{}", base, suffix);
        if seen.insert(candidate.to_lowercase()) {
            return candidate;
        }
    }
    // counters exhausted
    format!("{} [{}]", stem, id)
}

/// Return a file name not present in `taken`, adding ` (1)`, ` (2)`, ... before the
/// extension when needed, and record it as taken
///
/// Returns `None` if no free name was found within the attempt limit.
pub fn claim_unique_name(file_name: &str, taken: &mut HashSet<String>) -> Option<String> {
    if taken.insert(file_name.to_lowercase()) {
        return Some(file_name.to_string());
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let extension = path.extension().and_then(|e| e.to_str());

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = match extension {
            Some(ext) => format!("{} ({}).{}", stem, i, ext),
            None => format!("{} ({})", stem, i),
        };
        if taken.insert(candidate.to_lowercase()) {
            return Some(candidate);
        }
    }
    None
}

/// Directory holding a playlist's finished files: `<output_dir>/<sanitized name>`
#[must_use]
pub fn playlist_output_dir(output_dir: &Path, playlist_name: &str) -> PathBuf {
    output_dir.join(sanitize_filename(playlist_name))
}
