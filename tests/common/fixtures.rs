//! Fake `yt-dlp`/`ffmpeg` executables and playlist listings

use std::path::{Path, PathBuf};

/// Flat playlist listing with three downloadable entries and one private one
///
/// `COVER_URL` is replaced with the URL the covers should be served from.
pub const PLAYLIST_JSON: &str = r#"{
  "id": "PLfixture001",
  "title": "Fixture Mix",
  "uploader": "Curator - Topic",
  "entries": [
    {"id": "vid00000001", "title": "First Song", "uploader": "Band One - Topic", "duration": 201.0,
     "thumbnails": [{"url": "COVER_URL/small.jpg", "width": 120, "height": 90},
                    {"url": "COVER_URL/cover.jpg", "width": 1280, "height": 720}]},
    {"id": "vid00000002", "title": "[Private video]", "uploader": null},
    {"id": "vid00000003", "title": "Second Song", "uploader": "Band Two", "duration": 187.5},
    {"id": "brokenvid01", "title": "Broken Song", "uploader": "Band Three", "duration": 240.0}
  ]
}"#;

/// Fake yt-dlp: prints `listing.json` next to itself for `--flat-playlist`, fails
/// for `brokenvid01`, and otherwise writes the video id to the `-o` path
pub const FAKE_YT_DLP: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
case "$*" in
  *--flat-playlist*) cat "$dir/listing.json"; exit 0 ;;
  *v=brokenvid01*) echo "ERROR: [youtube] brokenvid01: Video unavailable" >&2; exit 1 ;;
esac
out=""
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) shift; out="$1" ;;
    *) url="$1" ;;
  esac
  shift
done
echo "$url" > "$out"
"#;

/// Fake ffmpeg: copies the `-i` input to the final argument
pub const FAKE_FFMPEG: &str = r#"#!/bin/sh
in=""
for arg in "$@"; do last="$arg"; done
while [ $# -gt 0 ]; do
  if [ "$1" = "-i" ]; then shift; in="$1"; fi
  shift
done
cp "$in" "$last"
"#;

/// Write an executable script named `name` into `dir`
#[cfg(unix)]
pub fn install_tool(dir: &Path, name: &str, script: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
