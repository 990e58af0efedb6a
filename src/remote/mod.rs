//! remote content and media stores
//!
//! The sync engine only talks to these two traits. `memory` keeps everything
//! in-process; `dir` mirrors a portal into a local directory.

pub mod dir;
pub mod memory;

pub use dir::DirPortal;
pub use memory::{BlobFault, ContentFault, MemoryBlobStore, MemoryContentStore};

use crate::archive::ReadSeek;
use crate::error::Result;
use crate::types::{BlobDownload, BlobPage, ContentFields, ContentItem};

/// the structured content side of a portal
pub trait ContentStore {
    /// content types defined on the portal
    fn list_content_types(&self) -> Result<Vec<String>>;

    /// items of one content type, in the store's listing order
    fn list_content_items(&self, content_type: &str) -> Result<Vec<ContentItem>>;

    /// create or replace the item stored at `id`
    fn upsert_content_item(&self, id: &str, fields: &ContentFields) -> Result<()>;

    /// remove the item stored at `id`
    fn delete_content_item(&self, id: &str) -> Result<()>;
}

/// the media side of a portal
pub trait BlobStore {
    /// one page of blob names; pass the previous page's marker to continue
    fn list_blobs(&self, marker: Option<&str>) -> Result<BlobPage>;

    /// start downloading a blob
    fn download_blob(&self, name: &str) -> Result<BlobDownload>;

    /// upload a blob, replacing any existing one with the same name
    fn upload_blob(&self, name: &str, content: &mut dyn ReadSeek) -> Result<()>;

    /// remove a blob
    fn delete_blob(&self, name: &str) -> Result<()>;
}

/// drain the paged blob listing
pub fn list_blob_names(store: &dyn BlobStore) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let page = store.list_blobs(marker.as_deref())?;
        names.extend(page.names);
        match page.next_marker {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    tracing::debug!(count = names.len(), "listed blobs");
    Ok(names)
}

/// ids of every content item, across all content types
pub fn list_content_ids(store: &dyn ContentStore) -> Result<Vec<String>> {
    let mut ids = Vec::new();

    for content_type in store.list_content_types()? {
        let items = store.list_content_items(&content_type)?;
        tracing::debug!(content_type = %content_type, count = items.len(), "listed content items");
        ids.extend(items.iter().filter_map(|item| item.id().map(str::to_string)));
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::content_id;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn test_list_blob_names_follows_markers() {
        let store = MemoryBlobStore::new().with_page_size(2);
        for name in ["a", "b", "c", "d", "e"] {
            store.insert(name, name.as_bytes().to_vec());
        }

        let first = store.list_blobs(None).unwrap();
        assert_eq!(first.names, vec!["a", "b"]);
        assert!(first.next_marker.is_some());

        assert_eq!(list_blob_names(&store).unwrap(), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_list_blob_names_empty() {
        let store = MemoryBlobStore::new();
        assert!(list_blob_names(&store).unwrap().is_empty());
    }

    #[test]
    fn test_list_content_ids_spans_types() {
        let store = MemoryContentStore::new();
        let fields = json!({"title": "t"}).as_object().unwrap().clone();
        store.upsert_content_item(&content_id("page", "a"), &fields).unwrap();
        store.upsert_content_item(&content_id("layout", "b"), &fields).unwrap();
        store.upsert_content_item(&content_id("page", "c"), &fields).unwrap();

        let mut ids = list_content_ids(&store).unwrap();
        ids.sort();
        assert_eq!(
            ids,
            vec![
                content_id("layout", "b"),
                content_id("page", "a"),
                content_id("page", "c"),
            ]
        );
    }

    #[test]
    fn test_listing_failure_propagates() {
        let store = MemoryBlobStore::new();
        store.insert("a", vec![1]);
        store.inject(BlobFault::List);
        assert!(list_blob_names(&store).is_err());

        let mut content = Cursor::new(vec![1u8]);
        store.upload_blob("b", &mut content).unwrap();
    }
}
