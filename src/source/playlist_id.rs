//! Playlist identifier extraction

use crate::error::{Error, Result};
use regex::Regex;

/// Shape of a playlist identifier
const PLAYLIST_ID_PATTERN: &str = r"^[A-Za-z0-9_-]{10,}$";

/// Extract the playlist identifier from a playlist URL or a bare identifier
///
/// URLs must carry the identifier in their `list` query parameter.
///
/// # Examples
///
/// ```
/// use playlist_dl::source::extract_playlist_id;
///
/// let id = extract_playlist_id(
///     "https://www.youtube.com/playlist?list=PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf",
/// )
/// .unwrap();
/// assert_eq!(id, "PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf");
///
/// assert!(extract_playlist_id("not a playlist").is_err());
/// ```
pub fn extract_playlist_id(input: &str) -> Result<String> {
    let input = input.trim();
    let pattern = Regex::new(PLAYLIST_ID_PATTERN)
        .map_err(|e| Error::Other(format!("invalid playlist id pattern: {}", e)))?;

    let candidate = match url::Url::parse(input) {
        Ok(parsed) => {
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::InvalidUrl(format!(
                    "unsupported URL scheme '{}' in {}",
                    parsed.scheme(),
                    input
                )));
            }
            parsed
                .query_pairs()
                .find(|(key, _)| key == "list")
                .map(|(_, value)| value.into_owned())
                .ok_or_else(|| {
                    Error::InvalidUrl(format!("{} has no 'list' query parameter", input))
                })?
        }
        Err(_) => input.to_string(),
    };

    if pattern.is_match(&candidate) {
        Ok(candidate)
    } else {
        Err(Error::InvalidUrl(format!(
            "'{}' is not a playlist URL or identifier",
            input
        )))
    }
}
