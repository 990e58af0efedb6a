use std::collections::HashSet;

use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::remote::{list_blob_names, list_content_ids};
use crate::sync::{Synchronizer, Tally, WriteResult};

/// deletions performed by a reconciliation sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub items: Tally,
    pub blobs: Tally,
}

impl ReconcileReport {
    pub fn errors(&self) -> usize {
        self.items.failed + self.blobs.failed
    }
}

impl Synchronizer<'_> {
    /// delete everything on the portal that `written` does not name
    ///
    /// the portal is listed again here rather than reusing an earlier
    /// listing. each sweep runs even if the other one fails; when both
    /// fail the error names both.
    pub fn reconcile(&self, written: &WriteResult) -> Result<ReconcileReport> {
        let items = self.sweep_items(&written.item_ids);
        let blobs = self.sweep_blobs(&written.blob_names);

        if let (Some(items), Some(blobs)) =
            (failure(&items, "content items"), failure(&blobs, "blobs"))
        {
            return Err(Error::Reconcile { items, blobs });
        }

        let report = ReconcileReport {
            items: items?,
            blobs: blobs?,
        };
        info!(
            "deleted {} content items and {} media blobs, {} errors",
            report.items.ok,
            report.blobs.ok,
            report.errors()
        );
        Ok(report)
    }

    /// delete every content item and blob on the portal
    pub fn reset(&self) -> Result<ReconcileReport> {
        self.reconcile(&WriteResult::default())
    }

    fn sweep_items(&self, keep: &[String]) -> Result<Tally> {
        let remote = list_content_ids(self.content)?;
        let mut tally = Tally::default();

        for id in subtract(remote, keep) {
            match self.content.delete_content_item(&id) {
                Ok(()) => {
                    debug!(id = %id, "deleted content item");
                    tally.ok += 1;
                }
                Err(e) => {
                    error!(id = %id, error = %e, "deleting content item");
                    tally.failed += 1;
                }
            }
        }

        Ok(tally)
    }

    fn sweep_blobs(&self, keep: &[String]) -> Result<Tally> {
        let remote = list_blob_names(self.blobs)?;
        let mut tally = Tally::default();

        for name in subtract(remote, keep) {
            match self.blobs.delete_blob(&name) {
                Ok(()) => {
                    debug!(blob = %name, "deleted blob");
                    tally.ok += 1;
                }
                Err(e) => {
                    error!(blob = %name, error = %e, "deleting blob");
                    tally.failed += 1;
                }
            }
        }

        Ok(tally)
    }
}

/// describe a failed sweep: a listing error or at least one failed deletion
fn failure(sweep: &Result<Tally>, what: &str) -> Option<String> {
    match sweep {
        Err(e) => Some(format!("listing {}: {}", what, e)),
        Ok(t) if t.failed > 0 => Some(format!("{} of {} {} failed", t.failed, t.total(), what)),
        Ok(_) => None,
    }
}

/// names in `remote` but not in `keep`, in remote order, each at most once
fn subtract(remote: Vec<String>, keep: &[String]) -> Vec<String> {
    let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
    let mut emitted = HashSet::new();
    remote
        .into_iter()
        .filter(|name| !keep.contains(name.as_str()) && emitted.insert(name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{BlobFault, ContentFault, ContentStore, MemoryBlobStore, MemoryContentStore};
    use crate::types::{content_id, ContentFields};
    use pretty_assertions::assert_eq;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn populated() -> (MemoryContentStore, MemoryBlobStore) {
        let content = MemoryContentStore::new();
        let blobs = MemoryBlobStore::new().with_page_size(1);
        for k in ["a", "b", "c"] {
            content
                .upsert_content_item(&content_id("page", k), &ContentFields::new())
                .unwrap();
            blobs.insert(k, vec![]);
        }
        (content, blobs)
    }

    #[test]
    fn test_subtract() {
        assert_eq!(
            subtract(strings(&["a", "b", "c"]), &strings(&["b", "c", "d"])),
            strings(&["a"])
        );
        assert_eq!(subtract(strings(&["c", "a"]), &[]), strings(&["c", "a"]));
        assert!(subtract(vec![], &strings(&["x"])).is_empty());
        assert!(subtract(strings(&["x"]), &strings(&["x", "x"])).is_empty());
        assert_eq!(subtract(strings(&["y", "z", "y"]), &[]), strings(&["y", "z"]));
        // exact match only
        assert_eq!(subtract(strings(&["A"]), &strings(&["a"])), strings(&["A"]));
    }

    #[test]
    fn test_keeps_written_deletes_rest() {
        let (content, blobs) = populated();
        let written = WriteResult {
            item_ids: vec![content_id("page", "b")],
            blob_names: strings(&["a", "c"]),
            ..Default::default()
        };

        let report = Synchronizer::new(&content, &blobs).reconcile(&written).unwrap();

        assert_eq!(report.items, Tally { ok: 2, failed: 0 });
        assert_eq!(report.blobs, Tally { ok: 1, failed: 0 });
        assert_eq!(content.ids(), vec![content_id("page", "b")]);
        assert_eq!(blobs.names(), strings(&["a", "c"]));
    }

    #[test]
    fn test_reset_empties_portal() {
        let (content, blobs) = populated();
        let report = Synchronizer::new(&content, &blobs).reset().unwrap();
        assert_eq!(report.errors(), 0);
        assert!(content.is_empty());
        assert!(blobs.is_empty());
    }

    #[test]
    fn test_one_failed_sweep_is_absorbed() {
        let (content, blobs) = populated();
        blobs.inject(BlobFault::Delete("b".into()));

        let report = Synchronizer::new(&content, &blobs).reset().unwrap();

        assert_eq!(report.blobs, Tally { ok: 2, failed: 1 });
        assert!(content.is_empty());
        assert_eq!(blobs.names(), strings(&["b"]));
    }

    #[test]
    fn test_both_sweeps_failing_names_both() {
        let (content, blobs) = populated();
        content.inject(ContentFault::Delete(content_id("page", "a")));
        blobs.inject(BlobFault::Delete("c".into()));

        let err = Synchronizer::new(&content, &blobs).reset().unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, Error::Reconcile { .. }));
        assert!(message.starts_with("deleting: "));
        assert!(message.contains("content items"));
        assert!(message.contains(" AND "));
        assert!(message.contains("blobs"));
        // the other deletions still went through
        assert_eq!(content.ids(), vec![content_id("page", "a")]);
        assert_eq!(blobs.names(), strings(&["c"]));
    }

    #[test]
    fn test_listing_failure() {
        let (content, blobs) = populated();
        content.inject(ContentFault::ListTypes);

        let err = Synchronizer::new(&content, &blobs).reset().unwrap_err();

        assert!(matches!(err, Error::Remote { .. }));
        // the blob sweep still ran
        assert!(blobs.is_empty());

        blobs.insert("z", vec![]);
        blobs.inject(BlobFault::Delete("z".into()));
        let err = Synchronizer::new(&content, &blobs).reset().unwrap_err();
        assert!(matches!(err, Error::Reconcile { .. }));
    }
}
