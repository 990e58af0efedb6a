//! devportal - developer portal backup and restore
//!
//! captures a portal's content items and media blobs into a single zip
//! archive, and applies such an archive back onto a portal, optionally
//! deleting whatever the archive does not contain.
//!
//! # Core concepts
//!
//! - **Content item**: a schema-less json record keyed by its `id` field
//! - **Blob**: a named binary media object
//! - **Archive**: a zip holding `data.json` (every content item, as one json
//!   array) plus one entry per blob, named after the blob
//! - **Reconciliation**: after an apply, deleting portal items and blobs that
//!   were not written from the archive
//!
//! # Example usage
//!
//! ```no_run
//! use devportal::remote::DirPortal;
//! use devportal::sync::{ApplyOptions, CaptureOptions, Synchronizer};
//! use std::path::Path;
//!
//! let portal = DirPortal::open(Path::new("/srv/portal")).unwrap();
//! let sync = Synchronizer::new(&portal, &portal);
//!
//! // snapshot the portal
//! sync.capture(Path::new("backup.zip"), &CaptureOptions::default()).unwrap();
//!
//! // restore it, deleting anything added since
//! sync.apply(Path::new("backup.zip"), &ApplyOptions::default()).unwrap();
//! ```

mod config;
mod error;

pub mod archive;
pub mod remote;
pub mod sync;
pub mod types;

pub use archive::{ArchiveReader, ArchiveWriter, EntryInfo, EntryKind, EntryStream};
pub use config::{Config, DEFAULT_PAGE_SIZE};
pub use error::{Error, IoResultExt, Result};
pub use remote::{BlobStore, ContentStore, DirPortal};
pub use sync::{ApplyOptions, ApplyReport, CaptureOptions, CaptureReport, Synchronizer};
pub use types::{content_id, parse_content_id, ContentFields, ContentItem, INDEX_ENTRY_NAME};
