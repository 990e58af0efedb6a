use std::path::Path;

use tracing::{error, info};

use crate::archive::{ArchiveReader, EntryStream, ProcessStats};
use crate::error::{Error, Result};
use crate::sync::{ReconcileReport, Synchronizer, Tally};
use crate::types::{ContentItem, INDEX_ENTRY_NAME};

/// apply options
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// delete remote items and blobs the archive does not contain
    pub delete_extra: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self { delete_extra: true }
    }
}

/// what an apply run managed to write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteResult {
    /// ids upserted successfully, in archive order
    pub item_ids: Vec<String>,
    /// blobs uploaded successfully, in archive order
    pub blob_names: Vec<String>,
    pub items: Tally,
    pub blobs: Tally,
}

/// outcome of an apply run
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub entries: ProcessStats,
    pub written: WriteResult,
    /// `None` when reconciliation was suppressed
    pub reconciled: Option<ReconcileReport>,
}

impl ApplyReport {
    pub fn errors(&self) -> usize {
        let deletes = self.reconciled.map_or(0, |r| r.errors());
        // entries that never reached a handler are only in the reader's stats
        let unopened = self.entries.failed().saturating_sub(self.written.blobs.failed);
        self.written.items.failed + self.written.blobs.failed + unopened + deletes
    }
}

impl Synchronizer<'_> {
    /// push an archive to the portal, then reconcile unless suppressed
    ///
    /// an archive without a content index is refused before anything is
    /// written. an index that cannot be opened or parsed fails the run and
    /// skips reconciliation.
    pub fn apply(&self, path: &Path, options: &ApplyOptions) -> Result<ApplyReport> {
        let reader = ArchiveReader::open(path)?;
        if !reader.has_index() {
            return Err(Error::MissingIndex(path.to_path_buf()));
        }

        let mut written = WriteResult::default();
        let mut index_error: Option<String> = None;
        let mut index_seen = false;

        let entries = {
            let mut reader = reader
                .with_index_handler(|stream| {
                    index_seen = true;
                    let result = self.apply_index(stream, &mut written.item_ids, &mut written.items);
                    if let Err(e) = &result {
                        index_error = Some(e.to_string());
                    }
                    result
                })
                .with_blob_handler(|name, stream| {
                    match self.blobs.upload_blob(name, stream) {
                        Ok(()) => {
                            written.blob_names.push(name.to_string());
                            written.blobs.ok += 1;
                            Ok(())
                        }
                        Err(e) => {
                            written.blobs.failed += 1;
                            Err(e)
                        }
                    }
                });
            let entries = reader.process();
            reader.close();
            entries
        };

        if let Some(message) = index_error {
            return Err(Error::InvalidIndex(message));
        }
        if !index_seen {
            return Err(Error::InvalidIndex(format!(
                "{} could not be opened",
                INDEX_ENTRY_NAME
            )));
        }

        let reconciled = if options.delete_extra {
            Some(self.reconcile(&written)?)
        } else {
            info!("reconciliation suppressed, leaving extra remote content in place");
            None
        };

        Ok(ApplyReport {
            entries,
            written,
            reconciled,
        })
    }

    /// upsert every item of the index, stripping ids into keys
    fn apply_index(
        &self,
        stream: &mut EntryStream,
        ids: &mut Vec<String>,
        tally: &mut Tally,
    ) -> Result<()> {
        let items: Vec<ContentItem> = serde_json::from_reader(stream)?;

        for (position, item) in items.into_iter().enumerate() {
            let outcome = item
                .into_parts(position)
                .and_then(|(id, fields)| {
                    self.content.upsert_content_item(&id, &fields)?;
                    Ok(id)
                });

            match outcome {
                Ok(id) => {
                    ids.push(id);
                    tally.ok += 1;
                }
                Err(e) => {
                    error!(position, error = %e, "applying content item");
                    tally.failed += 1;
                }
            }
        }

        info!(
            "applied {} content items, {} errors",
            tally.ok, tally.failed
        );
        Ok(())
    }
}
