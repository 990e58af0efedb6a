use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};
use zip::{CompressionMethod, ZipArchive};

use crate::archive::stream::{EntryEncoding, EntryStream, SeekableEntry, ZipEntrySource};
use crate::error::{Error, IoResultExt, Result};
use crate::types::INDEX_ENTRY_NAME;

/// handler for the content index entry
pub type IndexHandler<'h> = Box<dyn FnMut(&mut EntryStream) -> Result<()> + 'h>;

/// handler for every blob entry
pub type BlobHandler<'h> = Box<dyn FnMut(&str, &mut EntryStream) -> Result<()> + 'h>;

/// class of an archive entry, decided by name alone
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Index,
    Blob,
}

impl EntryKind {
    pub fn of(name: &str) -> Self {
        if name == INDEX_ENTRY_NAME {
            EntryKind::Index
        } else {
            EntryKind::Blob
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EntryKind::Index => "index",
            EntryKind::Blob => "blob",
        }
    }
}

/// listing information for one archive entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub compressed_size: u64,
}

impl fmt::Display for EntryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<5} {:>12} {:>12}  {}",
            self.kind.type_name(),
            self.size,
            self.compressed_size,
            self.name
        )
    }
}

/// per-class dispatch counts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryTally {
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// outcome of [`ArchiveReader::process`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub index: EntryTally,
    pub blobs: EntryTally,
}

impl ProcessStats {
    pub fn failed(&self) -> usize {
        self.index.failed + self.blobs.failed
    }

    fn tally_mut(&mut self, kind: EntryKind) -> &mut EntryTally {
        match kind {
            EntryKind::Index => &mut self.index,
            EntryKind::Blob => &mut self.blobs,
        }
    }
}

/// reads an archive entry by entry, dispatching to registered handlers
pub struct ArchiveReader<'h> {
    path: PathBuf,
    archive: ZipArchive<File>,
    index_handler: Option<IndexHandler<'h>>,
    blob_handler: Option<BlobHandler<'h>>,
}

impl<'h> ArchiveReader<'h> {
    /// open an existing archive
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                Error::ArchiveNotFound(path.to_path_buf())
            } else {
                Error::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let archive = ZipArchive::new(file).map_err(|source| Error::CorruptArchive {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            index_handler: None,
            blob_handler: None,
        })
    }

    /// register the handler invoked for the `data.json` entry
    pub fn with_index_handler(
        mut self,
        handler: impl FnMut(&mut EntryStream) -> Result<()> + 'h,
    ) -> Self {
        self.index_handler = Some(Box::new(handler));
        self
    }

    /// register the handler invoked for every other entry
    pub fn with_blob_handler(
        mut self,
        handler: impl FnMut(&str, &mut EntryStream) -> Result<()> + 'h,
    ) -> Self {
        self.blob_handler = Some(Box::new(handler));
        self
    }

    /// archive path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// number of entries in the archive
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// whether the archive carries a content index
    pub fn has_index(&self) -> bool {
        self.archive.index_for_name(INDEX_ENTRY_NAME).is_some()
    }

    /// list entries in storage order
    pub fn entries(&mut self) -> Result<Vec<EntryInfo>> {
        let mut out = Vec::with_capacity(self.archive.len());
        for i in 0..self.archive.len() {
            let entry = self.archive.by_index_raw(i).map_err(|source| Error::CorruptArchive {
                path: self.path.clone(),
                source,
            })?;
            out.push(EntryInfo {
                name: entry.name().to_string(),
                kind: EntryKind::of(entry.name()),
                size: entry.size(),
                compressed_size: entry.compressed_size(),
            });
        }
        Ok(out)
    }

    /// dispatch every entry, in storage order, to its handler
    ///
    /// a failing entry is logged and counted, never fatal: the remaining
    /// entries are still processed and the counts come back in the stats.
    pub fn process(&mut self) -> ProcessStats {
        let mut stats = ProcessStats::default();

        for i in 0..self.archive.len() {
            let listed = self.archive.name_for_index(i).unwrap_or_default().to_string();
            let (name, source) = match self.entry_source(i) {
                Ok(found) => found,
                Err(e) => {
                    error!(entry = %listed, error = %e, "opening archive entry");
                    stats.tally_mut(EntryKind::of(&listed)).failed += 1;
                    continue;
                }
            };

            let kind = EntryKind::of(&name);
            let mut stream = SeekableEntry::new(source);

            let outcome = match kind {
                EntryKind::Index => self.index_handler.as_mut().map(|h| h(&mut stream)),
                EntryKind::Blob => self.blob_handler.as_mut().map(|h| h(&name, &mut stream)),
            };

            let tally = stats.tally_mut(kind);
            match outcome {
                None => {
                    debug!(entry = %name, kind = kind.type_name(), "no handler, skipping entry");
                    tally.skipped += 1;
                }
                Some(Ok(())) => tally.ok += 1,
                Some(Err(e)) => {
                    error!(entry = %name, error = %e, "handling archive entry");
                    tally.failed += 1;
                }
            }
        }

        info!(
            "processed content index: {} ok, {} skipped, {} errors",
            stats.index.ok, stats.index.skipped, stats.index.failed
        );
        info!(
            "processed {} media blobs, {} skipped, {} errors",
            stats.blobs.ok, stats.blobs.skipped, stats.blobs.failed
        );

        stats
    }

    /// release the archive
    pub fn close(self) {
        debug!(path = %self.path.display(), "closing archive");
    }

    fn entry_source(&mut self, index: usize) -> Result<(String, ZipEntrySource)> {
        let entry = self.archive.by_index_raw(index).map_err(|source| Error::CorruptArchive {
            path: self.path.clone(),
            source,
        })?;
        let name = entry.name().to_string();

        if entry.encrypted() {
            return Err(Error::UnsupportedEntry {
                name,
                reason: "encrypted".to_string(),
            });
        }

        let encoding = match entry.compression() {
            CompressionMethod::Stored => EntryEncoding::Stored,
            CompressionMethod::Deflated => EntryEncoding::Deflated,
            other => {
                return Err(Error::UnsupportedEntry {
                    name,
                    reason: format!("compression method {:?}", other),
                })
            }
        };

        let data_start = entry.data_start();
        let compressed_size = entry.compressed_size();
        let size = entry.size();
        drop(entry);

        let file = File::open(&self.path).with_path(&self.path)?;
        let source = ZipEntrySource::new(file, data_start, compressed_size, size, encoding);
        Ok((name, source))
    }
}
