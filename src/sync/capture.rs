use std::path::Path;

use tracing::{debug, error, info};

use crate::archive::ArchiveWriter;
use crate::error::Result;
use crate::sync::{Synchronizer, Tally};
use crate::types::ContentItem;

/// capture options
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// replace an existing archive file
    pub overwrite: bool,
}

/// outcome of a capture run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// content types whose items were listed (or not)
    pub content_types: Tally,
    /// content items written to the index
    pub items: usize,
    pub blobs: Tally,
    /// uncompressed blob bytes written
    pub bytes: u64,
}

impl CaptureReport {
    pub fn errors(&self) -> usize {
        self.content_types.failed + self.blobs.failed
    }
}

impl Synchronizer<'_> {
    /// snapshot the portal into a new archive at `path`
    ///
    /// best-effort: a content type or blob that cannot be fetched is logged and
    /// counted, and the capture carries on without it.
    pub fn capture(&self, path: &Path, options: &CaptureOptions) -> Result<CaptureReport> {
        let mut report = CaptureReport::default();

        let items = self.collect_items(&mut report.content_types)?;
        report.items = items.len();
        info!(
            "captured {} content items, {} content types ok, {} errors",
            report.items, report.content_types.ok, report.content_types.failed
        );

        let mut writer = ArchiveWriter::create(path, options.overwrite)?;
        match self.write_archive(&mut writer, &items, &mut report) {
            Ok(()) => writer.close()?,
            Err(e) => {
                writer.discard();
                return Err(e);
            }
        }

        Ok(report)
    }

    fn write_archive(
        &self,
        writer: &mut ArchiveWriter,
        items: &[ContentItem],
        report: &mut CaptureReport,
    ) -> Result<()> {
        writer.add_content_items(&serde_json::to_vec(items)?)?;

        let mut marker: Option<String> = None;
        loop {
            let page = self.blobs.list_blobs(marker.as_deref())?;

            for name in &page.names {
                match self.capture_blob(writer, name) {
                    Ok(n) => {
                        report.blobs.ok += 1;
                        report.bytes += n;
                    }
                    Err(e) => {
                        error!(blob = %name, error = %e, "capturing blob");
                        report.blobs.failed += 1;
                    }
                }
            }

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        info!(
            "captured {} media blobs, {} errors",
            report.blobs.ok, report.blobs.failed
        );
        Ok(())
    }

    /// every content item, grouped by type in listing order
    fn collect_items(&self, types: &mut Tally) -> Result<Vec<ContentItem>> {
        let mut items = Vec::new();

        for content_type in self.content.list_content_types()? {
            match self.content.list_content_items(&content_type) {
                Ok(found) => {
                    debug!(content_type = %content_type, count = found.len(), "listed content items");
                    types.ok += 1;
                    items.extend(found);
                }
                Err(e) => {
                    error!(content_type = %content_type, error = %e, "listing content items");
                    types.failed += 1;
                }
            }
        }

        Ok(items)
    }

    fn capture_blob(&self, writer: &mut ArchiveWriter, name: &str) -> Result<u64> {
        let mut download = self.blobs.download_blob(name)?;
        writer.add_blob(name, &mut download.content, download.modified)
    }
}
