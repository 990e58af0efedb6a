//! the portable archive container
//!
//! An archive is a zip file holding one content index (`data.json`, a json
//! array of content items) followed or preceded by one entry per media blob,
//! named after the blob.

mod reader;
mod stream;
mod writer;

#[cfg(test)]
pub(crate) mod testutil;

pub use reader::{
    ArchiveReader, BlobHandler, EntryInfo, EntryKind, EntryTally, IndexHandler, ProcessStats,
};
pub use stream::{
    EntryEncoding, EntrySource, EntryStream, ReadSeek, SeekableEntry, ZipEntryReader,
    ZipEntrySource,
};
pub use writer::ArchiveWriter;
