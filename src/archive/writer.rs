use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, IoResultExt, Result};
use crate::types::INDEX_ENTRY_NAME;

/// writes one archive: a content index plus any number of blobs
///
/// call [`ArchiveWriter::close`] to finalize; dropping the writer finalizes
/// best-effort but cannot report failures.
pub struct ArchiveWriter {
    path: PathBuf,
    zip: Option<ZipWriter<File>>,
    names: HashSet<String>,
}

impl ArchiveWriter {
    /// create a new archive file
    ///
    /// fails with [`Error::ArchiveExists`] when the file exists and `overwrite` is false.
    pub fn create(path: &Path, overwrite: bool) -> Result<Self> {
        let mut opts = OpenOptions::new();
        opts.read(true).write(true);
        if overwrite {
            opts.create(true).truncate(true);
        } else {
            opts.create_new(true);
        }

        let file = opts.open(path).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                Error::ArchiveExists(path.to_path_buf())
            } else {
                Error::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            zip: Some(ZipWriter::new(file)),
            names: HashSet::new(),
        })
    }

    /// path of the archive being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// write the serialized content items as the index entry
    ///
    /// an archive holds exactly one index, so a second call fails with
    /// [`Error::DuplicateEntry`].
    pub fn add_content_items(&mut self, data: &[u8]) -> Result<()> {
        self.claim(INDEX_ENTRY_NAME)?;

        let zip = self.zip()?;
        zip.start_file(INDEX_ENTRY_NAME, entry_options(Some(SystemTime::now())))?;
        let written = zip.write_all(data);
        if let Err(e) = written {
            self.abandon_entry(INDEX_ENTRY_NAME);
            return Err(Error::Io {
                path: self.path.clone(),
                source: e,
            });
        }

        debug!(bytes = data.len(), "wrote content index to archive");
        Ok(())
    }

    /// stream a blob into a new entry, returning the number of bytes written
    ///
    /// a failed copy removes the partial entry before the error is returned.
    pub fn add_blob(
        &mut self,
        name: &str,
        content: &mut dyn Read,
        modified: Option<SystemTime>,
    ) -> Result<u64> {
        if name == INDEX_ENTRY_NAME {
            return Err(Error::ReservedEntryName(name.to_string()));
        }
        self.claim(name)?;

        let zip = self.zip()?;
        if let Err(e) = zip.start_file(name, entry_options(modified)) {
            self.names.remove(name);
            return Err(e.into());
        }

        let copied = io::copy(content, zip);
        match copied {
            Ok(n) => {
                debug!(blob = name, bytes = n, "wrote blob to archive");
                Ok(n)
            }
            Err(e) => {
                self.abandon_entry(name);
                Err(Error::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        }
    }

    /// finalize the container and flush it to disk
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    /// abandon the archive and remove its file
    pub fn discard(mut self) {
        drop(self.zip.take());
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "discarded partial archive"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "removing partial archive"),
        }
    }

    fn finish(&mut self) -> Result<()> {
        let Some(zip) = self.zip.take() else {
            return Ok(());
        };
        let file = zip.finish()?;
        file.sync_all().with_path(&self.path)?;
        Ok(())
    }

    fn zip(&mut self) -> Result<&mut ZipWriter<File>> {
        let path = &self.path;
        self.zip.as_mut().ok_or_else(|| Error::Io {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::Other, "archive already closed"),
        })
    }

    fn claim(&mut self, name: &str) -> Result<()> {
        if !self.names.insert(name.to_string()) {
            return Err(Error::DuplicateEntry(name.to_string()));
        }
        Ok(())
    }

    fn abandon_entry(&mut self, name: &str) {
        self.names.remove(name);
        if let Some(zip) = self.zip.as_mut() {
            if let Err(e) = zip.abort_file() {
                warn!(entry = name, error = %e, "failed to discard partial archive entry");
            }
        }
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if self.zip.is_some() {
            warn!(path = %self.path.display(), "archive writer dropped without close");
            if let Err(e) = self.finish() {
                warn!(path = %self.path.display(), error = %e, "finalizing archive failed");
            }
        }
    }
}

fn entry_options(modified: Option<SystemTime>) -> SimpleFileOptions {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    match modified {
        Some(t) => options.last_modified_time(zip_time(t)),
        None => options,
    }
}

/// convert to a zip timestamp (utc, clamped to the format's 1980-2107 range)
fn zip_time(t: SystemTime) -> zip::DateTime {
    let t: DateTime<Utc> = t.into();
    let Ok(year) = u16::try_from(t.year()) else {
        return zip::DateTime::default();
    };
    zip::DateTime::from_date_and_time(
        year,
        t.month() as u8,
        t.day() as u8,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
    )
    .unwrap_or_default()
}
