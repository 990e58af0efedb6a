//! a portal mirrored into a local directory
//!
//! layout:
//!
//! ```text
//! <root>/content/<type>/<key>.json   content item fields (id stripped)
//! <root>/blobs/<name>                media blobs, names may contain '/'
//! <root>/tmp/                        staging area for atomic writes
//! ```

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::archive::ReadSeek;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::{Error, IoResultExt, Result};
use crate::remote::{BlobStore, ContentStore};
use crate::types::{
    content_id, parse_content_id, BlobDownload, BlobPage, ContentFields, ContentItem,
};

const ITEM_EXTENSION: &str = "json";

/// a portal stored on the local filesystem
#[derive(Debug, Clone)]
pub struct DirPortal {
    path: PathBuf,
    page_size: usize,
}

impl DirPortal {
    /// initialize an empty portal at the given path
    pub fn init(path: &Path) -> Result<Self> {
        if path.join("content").exists() || path.join("blobs").exists() {
            return Err(Error::PortalExists(path.to_path_buf()));
        }

        fs::create_dir_all(path.join("content")).with_path(path)?;
        fs::create_dir_all(path.join("blobs")).with_path(path)?;
        fs::create_dir_all(path.join("tmp")).with_path(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// open an existing portal
    pub fn open(path: &Path) -> Result<Self> {
        if !path.join("content").is_dir() || !path.join("blobs").is_dir() {
            return Err(Error::NoPortal(path.to_path_buf()));
        }
        fs::create_dir_all(path.join("tmp")).with_path(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// number of blob names per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// portal root path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// path to content directory
    pub fn content_path(&self) -> PathBuf {
        self.path.join("content")
    }

    /// path to blobs directory
    pub fn blobs_path(&self) -> PathBuf {
        self.path.join("blobs")
    }

    /// path to tmp directory (for atomic writes)
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }

    fn item_path(&self, id: &str) -> Result<PathBuf> {
        let (content_type, key) =
            parse_content_id(id).ok_or_else(|| Error::InvalidContentId(id.to_string()))?;
        Ok(self
            .content_path()
            .join(content_type)
            .join(format!("{}.{}", key, ITEM_EXTENSION)))
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf> {
        validate_blob_name(name)?;
        Ok(self.blobs_path().join(name))
    }

    /// write `dest` atomically: temp file -> fsync -> rename
    fn write_atomic(&self, dest: &Path, write: impl FnOnce(&mut File) -> io::Result<()>) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }

        let tmp_path = self.tmp_path().join(uuid::Uuid::new_v4().to_string());
        let written = (|| {
            let mut tmp_file = File::create(&tmp_path)?;
            write(&mut tmp_file)?;
            tmp_file.sync_all()
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::Io {
                path: tmp_path,
                source: e,
            });
        }

        fs::rename(&tmp_path, dest).with_path(dest)?;
        Ok(())
    }

    /// remove now-empty directories between `from` and `stop` (exclusive)
    fn prune_empty_dirs(from: &Path, stop: &Path) {
        let mut dir = from.parent();
        while let Some(d) = dir {
            if d == stop || !d.starts_with(stop) {
                break;
            }
            if fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }
}

impl ContentStore for DirPortal {
    fn list_content_types(&self) -> Result<Vec<String>> {
        let root = self.content_path();
        let mut types = Vec::new();

        for entry in fs::read_dir(&root).with_path(&root)? {
            let entry = entry.with_path(&root)?;
            if !entry.file_type().with_path(entry.path())?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                types.push(name.to_string());
            }
        }

        types.sort();
        Ok(types)
    }

    fn list_content_items(&self, content_type: &str) -> Result<Vec<ContentItem>> {
        let dir = self.content_path().join(content_type);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).with_path(&dir)? {
            let path = entry.with_path(&dir)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ITEM_EXTENSION) {
                continue;
            }
            if let Some(key) = path.file_stem().and_then(|s| s.to_str()) {
                files.push((key.to_string(), path.clone()));
            }
        }
        files.sort();

        let mut items = Vec::with_capacity(files.len());
        for (key, path) in files {
            let text = fs::read_to_string(&path).with_path(&path)?;
            let fields: ContentFields = serde_json::from_str(&text)?;
            items.push(ContentItem::new(content_id(content_type, &key), fields));
        }

        Ok(items)
    }

    fn upsert_content_item(&self, id: &str, fields: &ContentFields) -> Result<()> {
        let path = self.item_path(id)?;
        let data = serde_json::to_vec_pretty(fields)?;
        self.write_atomic(&path, |f| f.write_all(&data))?;
        debug!(id, path = %path.display(), "stored content item");
        Ok(())
    }

    fn delete_content_item(&self, id: &str) -> Result<()> {
        let path = self.item_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                Self::prune_empty_dirs(&path, &self.content_path());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::ContentItemNotFound(id.to_string()))
            }
            Err(e) => Err(Error::Io { path, source: e }),
        }
    }
}

impl BlobStore for DirPortal {
    fn list_blobs(&self, marker: Option<&str>) -> Result<BlobPage> {
        let root = self.blobs_path();
        let mut names = Vec::new();

        for entry in WalkDir::new(&root).min_depth(1) {
            let entry = entry.map_err(|e| Error::Io {
                path: root.clone(),
                source: e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walkdir error")
                }),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            let name: Vec<&str> = rel
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect();
            names.push(name.join("/"));
        }

        // markers compare as strings, so page in string order
        names.sort();
        let mut remaining = names
            .into_iter()
            .filter(|name| marker.map_or(true, |m| name.as_str() > m));
        let page: Vec<String> = remaining.by_ref().take(self.page_size).collect();
        let next_marker = match (remaining.next(), page.last()) {
            (Some(_), Some(last)) => Some(last.clone()),
            _ => None,
        };

        Ok(BlobPage {
            names: page,
            next_marker,
        })
    }

    fn download_blob(&self, name: &str) -> Result<BlobDownload> {
        let path = self.blob_path(name)?;
        let file = File::open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::BlobNotFound(name.to_string())
            } else {
                Error::Io {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;
        let modified = file.metadata().and_then(|m| m.modified()).ok();
        Ok(BlobDownload::new(file, modified))
    }

    fn upload_blob(&self, name: &str, content: &mut dyn ReadSeek) -> Result<()> {
        let path = self.blob_path(name)?;
        self.write_atomic(&path, |f| {
            content.seek(SeekFrom::Start(0))?;
            io::copy(content, f).map(|_| ())
        })?;
        debug!(blob = name, "stored blob");
        Ok(())
    }

    fn delete_blob(&self, name: &str) -> Result<()> {
        let path = self.blob_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                Self::prune_empty_dirs(&path, &self.blobs_path());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::BlobNotFound(name.to_string()))
            }
            Err(e) => Err(Error::Io { path, source: e }),
        }
    }
}

/// blob names are relative, '/'-separated, with no empty or dot components
fn validate_blob_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.contains('\\')
        || name.contains('\0')
        || name
            .split('/')
            .any(|c| c.is_empty() || c == "." || c == "..");
    if bad {
        return Err(Error::InvalidBlobName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Cursor, Read};
    use tempfile::tempdir;

    fn test_portal() -> (tempfile::TempDir, DirPortal) {
        let dir = tempdir().unwrap();
        let portal = DirPortal::init(&dir.path().join("portal")).unwrap();
        (dir, portal)
    }

    #[test]
    fn test_init_and_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portal");

        assert!(matches!(DirPortal::open(&path), Err(Error::NoPortal(_))));
        DirPortal::init(&path).unwrap();
        assert!(matches!(DirPortal::init(&path), Err(Error::PortalExists(_))));
        DirPortal::open(&path).unwrap();
    }

    #[test]
    fn test_content_roundtrip() {
        let (_dir, portal) = test_portal();
        let id = content_id("page", "home");
        let fields = json!({"title": "Home", "nodes": [1, 2]}).as_object().unwrap().clone();

        portal.upsert_content_item(&id, &fields).unwrap();
        portal
            .upsert_content_item(&content_id("layout", "main"), &fields)
            .unwrap();

        assert_eq!(portal.list_content_types().unwrap(), vec!["layout", "page"]);
        let items = portal.list_content_items("page").unwrap();
        assert_eq!(items, vec![ContentItem::new(id.clone(), fields)]);
        assert!(portal.list_content_items("missing").unwrap().is_empty());

        portal.delete_content_item(&id).unwrap();
        assert_eq!(portal.list_content_types().unwrap(), vec!["layout"]);
        assert!(matches!(
            portal.delete_content_item(&id),
            Err(Error::ContentItemNotFound(_))
        ));
    }

    #[test]
    fn test_content_rejects_bad_id() {
        let (_dir, portal) = test_portal();
        assert!(matches!(
            portal.upsert_content_item("../../etc/passwd", &ContentFields::new()),
            Err(Error::InvalidContentId(_))
        ));
    }

    #[test]
    fn test_blob_roundtrip_nested() {
        let (_dir, portal) = test_portal();
        portal
            .upload_blob("images/2024/logo.png", &mut Cursor::new(b"png".to_vec()))
            .unwrap();

        let mut dl = portal.download_blob("images/2024/logo.png").unwrap();
        assert!(dl.modified.is_some());
        let mut data = Vec::new();
        dl.content.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"png");

        portal.delete_blob("images/2024/logo.png").unwrap();
        assert!(!portal.blobs_path().join("images").exists());
        assert!(matches!(
            portal.download_blob("images/2024/logo.png"),
            Err(Error::BlobNotFound(_))
        ));
    }

    #[test]
    fn test_upload_rewinds_stream() {
        let (_dir, portal) = test_portal();
        let mut content = Cursor::new(b"full content".to_vec());
        content.set_position(5);
        portal.upload_blob("a.txt", &mut content).unwrap();
        assert_eq!(
            fs::read(portal.blobs_path().join("a.txt")).unwrap(),
            b"full content"
        );
        // staging area left clean
        assert_eq!(fs::read_dir(portal.tmp_path()).unwrap().count(), 0);
    }

    #[test]
    fn test_blob_listing_pages_in_string_order() {
        let (_dir, portal) = test_portal();
        let portal = portal.with_page_size(2);
        for name in ["a/b", "a.txt", "c", "a/a"] {
            portal.upload_blob(name, &mut Cursor::new(vec![0u8])).unwrap();
        }

        let p1 = portal.list_blobs(None).unwrap();
        assert_eq!(p1.names, vec!["a.txt", "a/a"]);
        let p2 = portal.list_blobs(p1.next_marker.as_deref()).unwrap();
        assert_eq!(p2.names, vec!["a/b", "c"]);
        assert_eq!(p2.next_marker, None);
    }

    #[test]
    fn test_invalid_blob_names() {
        for name in ["", "/abs", "a//b", "../x", "a/./b", "a\\b"] {
            assert!(validate_blob_name(name).is_err(), "{name:?} accepted");
        }
        validate_blob_name("fonts/a.woff2").unwrap();
    }
}
