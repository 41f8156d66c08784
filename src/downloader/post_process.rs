//! Post-processing of a finished batch.

use crate::archive::create_archive;
use crate::types::{ArchiveSummary, Batch, Event, ItemResult};
use futures::StreamExt;
use std::collections::HashSet;
use std::path::Path;

use super::PlaylistDownloader;

impl PlaylistDownloader {
    /// Write tags to every finished file, returning how many could not be tagged
    ///
    /// The album is the batch name and the track number is the item's 1-based
    /// position. Tagging failures emit [`Event::TagFailed`] and never fail the item.
    /// Files shared by several items (overwrite collision policy) are tagged once,
    /// for the first item that produced them.
    pub(crate) async fn tag_results(&self, batch: &Batch, results: &[ItemResult]) -> usize {
        let Some(tagger) = &self.tagger else {
            return 0;
        };

        let mut seen = HashSet::new();
        let jobs: Vec<_> = results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| {
                let path = r.output_path.as_deref()?;
                let item = batch.items.get(r.position)?;
                seen.insert(path).then_some((r, item, path))
            })
            .collect();
        if jobs.is_empty() {
            return 0;
        }
        tracing::info!(files = jobs.len(), album = %batch.name, "writing tags");

        let outcomes: Vec<bool> = futures::stream::iter(jobs)
            .map(|(result, item, path)| async move {
                let track = u32::try_from(result.position + 1).unwrap_or(u32::MAX);
                match tagger.tag_file(path, item, &batch.name, track).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            item_id = %item.id,
                            path = %path.display(),
                            error = %e,
                            "tagging failed"
                        );
                        self.event_tx
                            .send(Event::TagFailed {
                                item_id: item.id.clone(),
                                error: e.to_string(),
                            })
                            .ok();
                        false
                    }
                }
            })
            .buffer_unordered(self.config.download.concurrency.max(1))
            .collect()
            .await;

        outcomes.iter().filter(|ok| !**ok).count()
    }

    /// Archive the playlist directory next to it as `<name>.zip`
    ///
    /// The finished files stay on disk either way, so a failed archive is logged
    /// and reported as absent rather than failing the run.
    pub(crate) async fn archive_output(&self, output_dir: &Path) -> Option<ArchiveSummary> {
        let mut file_name = output_dir.file_name()?.to_os_string();
        file_name.push(".zip");
        let dest = output_dir.with_file_name(file_name);

        match create_archive(output_dir, &dest).await {
            Ok(summary) => {
                self.event_tx.send(Event::Archived(summary.clone())).ok();
                Some(summary)
            }
            Err(e) => {
                tracing::error!(dest = %dest.display(), error = %e, "archive creation failed");
                None
            }
        }
    }

    /// Remove the staging directory this run created, if the run left it empty
    pub(crate) async fn cleanup_staging(&self) {
        let temp_dir = &self.config.download.temp_dir;
        if let Err(e) = tokio::fs::remove_dir(temp_dir).await {
            tracing::debug!(path = %temp_dir.display(), error = %e, "staging directory kept");
        }
    }
}
