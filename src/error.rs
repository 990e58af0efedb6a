use std::path::PathBuf;

/// error type for archive and sync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("archive already exists at {0} (use --force to overwrite)")]
    ArchiveExists(PathBuf),

    #[error("archive not found at {0}")]
    ArchiveNotFound(PathBuf),

    #[error("corrupt archive {path}: {source}")]
    CorruptArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("duplicate archive entry: {0}")]
    DuplicateEntry(String),

    #[error("entry name is reserved for the content index: {0}")]
    ReservedEntryName(String),

    #[error("archive {0} has no content index")]
    MissingIndex(PathBuf),

    #[error("unreadable content index: {0}")]
    InvalidIndex(String),

    #[error("invalid seek to negative position {0}")]
    InvalidSeek(i128),

    #[error("unsupported archive entry {name}: {reason}")]
    UnsupportedEntry { name: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("content item {0} has no string id")]
    MissingContentId(usize),

    #[error("invalid content item id: {0}")]
    InvalidContentId(String),

    #[error("invalid blob name: {0}")]
    InvalidBlobName(String),

    #[error("content item not found: {0}")]
    ContentItemNotFound(String),

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    #[error("remote error: {message}")]
    Remote { message: String },

    #[error("deleting: {items} AND {blobs}")]
    Reconcile { items: String, blobs: String },

    #[error("portal not found at {0}")]
    NoPortal(PathBuf),

    #[error("portal already exists at {0}")]
    PortalExists(PathBuf),

    #[error("no portal given (use --portal or set portal in the config file)")]
    PortalNotConfigured,

    #[error("{0} deletes all portal content, pass --yes to confirm")]
    NotConfirmed(&'static str),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// shorthand for a collaborator failure
    pub fn remote(message: impl Into<String>) -> Self {
        Error::Remote {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
