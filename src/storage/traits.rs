use async_trait::async_trait;

/// Path-addressable durable store. Paths are absolute, '/'-separated and
/// independent of the backend.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` at `path`. With `overwrite`, any existing content is fully replaced.
    async fn put(&self, path: &str, bytes: Vec<u8>, overwrite: bool) -> Result<(), StorageError>;

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError>;

    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned status {status} for {path}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },

    #[error("{path} already exists")]
    AlreadyExists { path: String },

    #[error("invalid store path '{0}'")]
    InvalidPath(String),

    #[error("Storage error: {0}")]
    Generic(String),
}
