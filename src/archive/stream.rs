//! random access over forward-only archive entries
//!
//! A compressed entry can only be decoded from its first byte. `SeekableEntry`
//! emulates `Seek` on top of that by reopening the entry and discarding bytes
//! up to the requested offset. Backward seeks therefore cost O(offset), which
//! is fine for the "probe length, rewind, read fully" pattern uploads use.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Take};

use flate2::read::DeflateDecoder;
use tracing::trace;

use crate::error::Error;

/// a reader that can also seek, usable as a trait object
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// something that can produce a fresh decoder for one entry
pub trait EntrySource {
    type Reader: Read;

    /// open a new reader positioned at the first byte of the entry
    fn open(&mut self) -> io::Result<Self::Reader>;

    /// uncompressed size of the entry, known without decoding it
    fn size(&self) -> u64;
}

/// `Read + Seek` view of a single archive entry
pub struct SeekableEntry<S: EntrySource> {
    source: S,
    reader: Option<S::Reader>,
    offset: u64,
}

impl<S: EntrySource> SeekableEntry<S> {
    /// wrap a source, positioned at offset 0
    pub fn new(source: S) -> Self {
        Self {
            source,
            reader: None,
            offset: 0,
        }
    }

    /// current logical offset
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// uncompressed size of the entry
    pub fn size(&self) -> u64 {
        self.source.size()
    }

    /// underlying entry source
    pub fn source(&self) -> &S {
        &self.source
    }

    fn reader(&mut self) -> io::Result<&mut S::Reader> {
        if self.reader.is_none() {
            let reader = self.source.open()?;
            self.offset = 0;
            self.reader = Some(reader);
        }
        self.reader
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "entry reader unavailable"))
    }
}

impl<S: EntrySource> Read for SeekableEntry<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // past the end: the decoder is drained, never hand out more
        if self.offset >= self.source.size() {
            return Ok(0);
        }

        let n = self.reader()?.read(buf)?;
        self.offset += n as u64;
        trace!(bytes = n, offset = self.offset, "entry read");
        Ok(n)
    }
}

impl<S: EntrySource> Seek for SeekableEntry<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let size = self.source.size();
        let target: i128 = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::Current(delta) => self.offset as i128 + delta as i128,
            SeekFrom::End(delta) => size as i128 + delta as i128,
        };

        trace!(current = self.offset, ?pos, target = %target, "entry seek");

        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                Error::InvalidSeek(target),
            ));
        }
        let target = u64::try_from(target).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, Error::InvalidSeek(target))
        })?;

        if target == self.offset {
            trace!("entry seek is a no-op");
            return Ok(target);
        }

        // reopen and skip forward, never past the end of the entry
        self.reader = None;
        self.offset = 0;
        let skip = target.min(size);
        let reader = self.reader()?;
        let skipped = io::copy(&mut reader.by_ref().take(skip), &mut io::sink())?;
        if skipped < skip {
            self.reader = None;
            self.offset = 0;
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("entry ended after {} of {} bytes", skipped, skip),
            ));
        }

        self.offset = target;
        Ok(target)
    }
}

/// how an entry's bytes are stored in the container
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryEncoding {
    Stored,
    Deflated,
}

/// reopenable view of one entry inside a zip file on disk
///
/// each source owns its own file handle, so entries never share decoder state.
#[derive(Debug)]
pub struct ZipEntrySource {
    file: File,
    data_start: u64,
    compressed_size: u64,
    size: u64,
    encoding: EntryEncoding,
}

impl ZipEntrySource {
    pub fn new(
        file: File,
        data_start: u64,
        compressed_size: u64,
        size: u64,
        encoding: EntryEncoding,
    ) -> Self {
        Self {
            file,
            data_start,
            compressed_size,
            size,
            encoding,
        }
    }

    pub fn encoding(&self) -> EntryEncoding {
        self.encoding
    }
}

/// decoder over a zip entry's raw bytes
pub enum ZipEntryReader {
    Stored(Take<File>),
    Deflated(DeflateDecoder<Take<File>>),
}

impl Read for ZipEntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ZipEntryReader::Stored(r) => r.read(buf),
            ZipEntryReader::Deflated(r) => r.read(buf),
        }
    }
}

impl EntrySource for ZipEntrySource {
    type Reader = ZipEntryReader;

    fn open(&mut self) -> io::Result<ZipEntryReader> {
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(self.data_start))?;
        let raw = file.take(self.compressed_size);
        Ok(match self.encoding {
            EntryEncoding::Stored => ZipEntryReader::Stored(raw),
            EntryEncoding::Deflated => ZipEntryReader::Deflated(DeflateDecoder::new(raw)),
        })
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// seekable stream over a zip entry, as handed to archive handlers
pub type EntryStream = SeekableEntry<ZipEntrySource>;
