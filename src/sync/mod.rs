//! capture, apply and reconciliation between a portal and an archive

mod apply;
mod capture;
mod reconcile;

pub use apply::{ApplyOptions, ApplyReport, WriteResult};
pub use capture::{CaptureOptions, CaptureReport};
pub use reconcile::ReconcileReport;

use crate::remote::{BlobStore, ContentStore};

/// success and failure counts for one kind of per-item operation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub ok: usize,
    pub failed: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.ok + self.failed
    }
}

/// drives archive readers and writers against a portal's two stores
///
/// every run lists the stores afresh; nothing is cached between calls.
#[derive(Clone, Copy)]
pub struct Synchronizer<'a> {
    content: &'a dyn ContentStore,
    blobs: &'a dyn BlobStore,
}

impl<'a> Synchronizer<'a> {
    pub fn new(content: &'a dyn ContentStore, blobs: &'a dyn BlobStore) -> Self {
        Self { content, blobs }
    }
}
