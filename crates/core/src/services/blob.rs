use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Invalid connection string: {0}")]
    ConnectionString(String),
    #[error("Invalid blob URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Blob request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Blob {container}/{blob} not found")]
    NotFound { container: String, blob: String },
    #[error("Blob service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Blob download failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Object storage addressed by container and blob name.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the full content of `container/blob`.
    async fn download(&self, container: &str, blob: &str) -> Result<Vec<u8>, BlobError>;

    /// Create or overwrite `container/blob` with `data`.
    async fn upload(&self, container: &str, blob: &str, data: Vec<u8>) -> Result<(), BlobError>;

    /// Create `container` if it does not exist yet.
    async fn ensure_container(&self, container: &str) -> Result<(), BlobError>;
}
