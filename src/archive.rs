//! ZIP archive creation for finished playlists

use crate::error::{Error, Result};
use crate::types::ArchiveSummary;
use crate::utils::claim_unique_name;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Write every file under `source_dir` into a deflate-compressed ZIP at `dest`
///
/// The archive is flat: each entry is named after its file name alone, and
/// duplicate names get ` (1)`, ` (2)`, ... appended before the extension. Files are
/// added in path order, so the same directory always produces the same entry names.
/// `dest` is skipped if it lives inside `source_dir`.
pub async fn create_archive(source_dir: &Path, dest: &Path) -> Result<ArchiveSummary> {
    let source_dir = source_dir.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || write_archive(&source_dir, &dest))
        .await
        .map_err(|e| Error::Other(format!("archive task failed: {}", e)))?
}

fn write_archive(source_dir: &Path, dest: &Path) -> Result<ArchiveSummary> {
    if !source_dir.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", source_dir.display()),
        )));
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(source_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to walk {}: {}",
                source_dir.display(),
                e
            )))
        })?;
        if entry.file_type().is_file() && entry.path() != dest {
            files.push(entry.into_path());
        }
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = zip::ZipWriter::new(BufWriter::new(File::create(dest)?));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    let mut taken = HashSet::with_capacity(files.len());
    for path in &files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry_name = claim_unique_name(&file_name, &mut taken).ok_or_else(|| {
            Error::Other(format!("too many archive entries named {}", file_name))
        })?;

        writer.start_file(entry_name.as_str(), options)?;
        let mut input = File::open(path)?;
        std::io::copy(&mut input, &mut writer)?;
        tracing::debug!(entry = %entry_name, source = %path.display(), "archived");
    }

    let mut buffered = writer.finish()?;
    std::io::Write::flush(&mut buffered)?;
    drop(buffered);

    let summary = ArchiveSummary {
        path: dest.to_path_buf(),
        entry_count: files.len(),
        compressed_size: std::fs::metadata(dest)?.len(),
    };
    tracing::info!(
        path = %summary.path.display(),
        entries = summary.entry_count,
        bytes = summary.compressed_size,
        "Archive created"
    );
    Ok(summary)
}
