//! in-process stores with fault injection

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::time::SystemTime;

use crate::archive::ReadSeek;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::{Error, IoResultExt, Result};
use crate::remote::{BlobStore, ContentStore};
use crate::types::{parse_content_id, BlobDownload, BlobPage, ContentFields, ContentItem};

/// operation on a [`MemoryContentStore`] that should fail
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContentFault {
    ListTypes,
    ListItems(String),
    Upsert(String),
    Delete(String),
}

/// content items held in memory, keyed by id
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    items: RefCell<BTreeMap<String, ContentFields>>,
    faults: RefCell<HashSet<ContentFault>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// make an operation fail until faults are cleared
    pub fn inject(&self, fault: ContentFault) {
        self.faults.borrow_mut().insert(fault);
    }

    pub fn clear_faults(&self) {
        self.faults.borrow_mut().clear();
    }

    /// all stored ids, sorted
    pub fn ids(&self) -> Vec<String> {
        self.items.borrow().keys().cloned().collect()
    }

    /// stored fields of one item
    pub fn get(&self, id: &str) -> Option<ContentFields> {
        self.items.borrow().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    fn check(&self, fault: ContentFault) -> Result<()> {
        if self.faults.borrow().contains(&fault) {
            return Err(Error::remote(format!("injected fault: {:?}", fault)));
        }
        Ok(())
    }
}

impl ContentStore for MemoryContentStore {
    fn list_content_types(&self) -> Result<Vec<String>> {
        self.check(ContentFault::ListTypes)?;
        let types: BTreeSet<String> = self
            .items
            .borrow()
            .keys()
            .filter_map(|id| parse_content_id(id).map(|(ty, _)| ty.to_string()))
            .collect();
        Ok(types.into_iter().collect())
    }

    fn list_content_items(&self, content_type: &str) -> Result<Vec<ContentItem>> {
        self.check(ContentFault::ListItems(content_type.to_string()))?;
        Ok(self
            .items
            .borrow()
            .iter()
            .filter(|(id, _)| matches!(parse_content_id(id), Some((ty, _)) if ty == content_type))
            .map(|(id, fields)| ContentItem::new(id.clone(), fields.clone()))
            .collect())
    }

    fn upsert_content_item(&self, id: &str, fields: &ContentFields) -> Result<()> {
        if parse_content_id(id).is_none() {
            return Err(Error::InvalidContentId(id.to_string()));
        }
        self.check(ContentFault::Upsert(id.to_string()))?;
        self.items.borrow_mut().insert(id.to_string(), fields.clone());
        Ok(())
    }

    fn delete_content_item(&self, id: &str) -> Result<()> {
        self.check(ContentFault::Delete(id.to_string()))?;
        match self.items.borrow_mut().remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::ContentItemNotFound(id.to_string())),
        }
    }
}

/// operation on a [`MemoryBlobStore`] that should fail
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlobFault {
    List,
    Download(String),
    Upload(String),
    Delete(String),
}

#[derive(Clone, Debug)]
struct StoredBlob {
    data: Vec<u8>,
    modified: SystemTime,
}

/// blobs held in memory, listed in name order
#[derive(Debug)]
pub struct MemoryBlobStore {
    blobs: RefCell<BTreeMap<String, StoredBlob>>,
    faults: RefCell<HashSet<BlobFault>>,
    page_size: usize,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self {
            blobs: RefCell::new(BTreeMap::new()),
            faults: RefCell::new(HashSet::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// number of names per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// store a blob directly, bypassing faults
    pub fn insert(&self, name: impl Into<String>, data: Vec<u8>) {
        self.blobs.borrow_mut().insert(
            name.into(),
            StoredBlob {
                data,
                modified: SystemTime::now(),
            },
        );
    }

    /// make an operation fail until faults are cleared
    pub fn inject(&self, fault: BlobFault) {
        self.faults.borrow_mut().insert(fault);
    }

    pub fn clear_faults(&self) {
        self.faults.borrow_mut().clear();
    }

    /// all stored names, sorted
    pub fn names(&self) -> Vec<String> {
        self.blobs.borrow().keys().cloned().collect()
    }

    /// content of one blob
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.borrow().get(name).map(|b| b.data.clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.borrow().is_empty()
    }

    fn check(&self, fault: BlobFault) -> Result<()> {
        if self.faults.borrow().contains(&fault) {
            return Err(Error::remote(format!("injected fault: {:?}", fault)));
        }
        Ok(())
    }
}

impl BlobStore for MemoryBlobStore {
    fn list_blobs(&self, marker: Option<&str>) -> Result<BlobPage> {
        self.check(BlobFault::List)?;

        let blobs = self.blobs.borrow();
        let mut remaining = blobs
            .keys()
            .filter(|name| marker.map_or(true, |m| name.as_str() > m));
        let names: Vec<String> = remaining.by_ref().take(self.page_size).cloned().collect();

        let next_marker = match (remaining.next(), names.last()) {
            (Some(_), Some(last)) => Some(last.clone()),
            _ => None,
        };
        Ok(BlobPage { names, next_marker })
    }

    fn download_blob(&self, name: &str) -> Result<BlobDownload> {
        self.check(BlobFault::Download(name.to_string()))?;
        let blobs = self.blobs.borrow();
        let blob = blobs
            .get(name)
            .ok_or_else(|| Error::BlobNotFound(name.to_string()))?;
        Ok(BlobDownload::new(
            Cursor::new(blob.data.clone()),
            Some(blob.modified),
        ))
    }

    fn upload_blob(&self, name: &str, content: &mut dyn ReadSeek) -> Result<()> {
        self.check(BlobFault::Upload(name.to_string()))?;

        // size the buffer up front, then rewind and read everything
        let len = content.seek(SeekFrom::End(0)).with_path(name)?;
        content.seek(SeekFrom::Start(0)).with_path(name)?;
        let mut data = Vec::with_capacity(len as usize);
        content.read_to_end(&mut data).with_path(name)?;

        self.insert(name, data);
        Ok(())
    }

    fn delete_blob(&self, name: &str) -> Result<()> {
        self.check(BlobFault::Delete(name.to_string()))?;
        match self.blobs.borrow_mut().remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::BlobNotFound(name.to_string())),
        }
    }
}
