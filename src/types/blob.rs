use std::fmt;
use std::io::Read;
use std::time::SystemTime;

/// one page of a blob container listing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlobPage {
    /// blob names in this page, in listing order
    pub names: Vec<String>,
    /// opaque continuation marker; `None` once the listing is complete
    pub next_marker: Option<String>,
}

/// an in-flight blob download
pub struct BlobDownload {
    /// blob content
    pub content: Box<dyn Read>,
    /// last modification time reported by the store
    pub modified: Option<SystemTime>,
}

impl BlobDownload {
    pub fn new(content: impl Read + 'static, modified: Option<SystemTime>) -> Self {
        Self {
            content: Box::new(content),
            modified,
        }
    }
}

impl fmt::Debug for BlobDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobDownload")
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}
