//! In-memory blob store for tests and local development.

use super::{BlobError, BlobResult, BlobStore};
use crate::domain::model::Bucket;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

const BASE_URL: &str = "http://blobs.local";

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<(Bucket, String), StoredObject>>,
    fail_removals: AtomicBool,
    puts: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `remove` fail (exercises partial-failure paths).
    pub fn fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, bucket: Bucket, path: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket, path.to_string()))
            .cloned()
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BlobResult<String> {
        let mut objects = self.objects.write().await;
        let slot = (bucket, key.to_string());
        if objects.contains_key(&slot) {
            return Err(BlobError::Rejected {
                status: 409,
                body: format!("{}/{} already exists", bucket, key),
            });
        }
        objects.insert(
            slot,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(key.to_string())
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> Option<String> {
        bucket
            .is_public()
            .then(|| format!("{}/public/{}/{}", BASE_URL, bucket.name(), path))
    }

    async fn signed_url(&self, bucket: Bucket, path: &str, ttl: Duration) -> BlobResult<String> {
        if !self
            .objects
            .read()
            .await
            .contains_key(&(bucket, path.to_string()))
        {
            return Err(BlobError::NotFound {
                bucket,
                path: path.to_string(),
            });
        }
        let expires = (Utc::now() + ttl).timestamp();
        Ok(format!(
            "{}/signed/{}/{}?expires={}",
            BASE_URL,
            bucket.name(),
            path,
            expires
        ))
    }

    async fn remove(&self, bucket: Bucket, paths: &[String]) -> BlobResult<()> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(BlobError::Rejected {
                status: 503,
                body: "removal disabled".to_string(),
            });
        }
        let mut objects = self.objects.write().await;
        for path in paths {
            objects.remove(&(bucket, path.clone()));
        }
        Ok(())
    }
}
