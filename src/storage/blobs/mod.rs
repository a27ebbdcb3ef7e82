//! Blob store: named buckets of opaque objects.

use crate::domain::model::Bucket;
use async_trait::async_trait;
use chrono::Duration;
use thiserror::Error;

pub mod http;
pub mod memory;

pub use http::HttpBlobStore;
pub use memory::MemoryBlobStore;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob storage is not configured (STORAGE_URL / STORAGE_SERVICE_KEY missing)")]
    NotConfigured,
    #[error("object {bucket}/{path} not found")]
    NotFound { bucket: Bucket, path: String },
    #[error("storage rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key` and returns the storage path (relative to the bucket).
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BlobResult<String>;

    /// Plain URL of an object. `None` for private buckets.
    fn public_url(&self, bucket: Bucket, path: &str) -> Option<String>;

    /// Time-limited URL granting read access to an object in any bucket.
    async fn signed_url(&self, bucket: Bucket, path: &str, ttl: Duration) -> BlobResult<String>;

    async fn remove(&self, bucket: Bucket, paths: &[String]) -> BlobResult<()>;

    /// Inverse of `public_url`: the object path if `url` points into `bucket`.
    fn path_from_public_url(&self, bucket: Bucket, url: &str) -> Option<String> {
        let prefix = self.public_url(bucket, "")?;
        url.strip_prefix(prefix.as_str())
            .map(|p| p.split('?').next().unwrap_or(p).to_string())
            .filter(|p| !p.is_empty())
    }
}
