mod blob;
mod content;

pub use blob::{BlobDownload, BlobPage};
pub use content::{content_id, parse_content_id, ContentFields, ContentItem, INDEX_ENTRY_NAME};
