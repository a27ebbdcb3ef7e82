//! File storage gateway. Holds the privileged blob store; callers only ever see paths and URLs.

use crate::domain::model::{Bucket, Product};
use crate::domain::{StorefrontError, StorefrontResult};
use crate::storage::BlobStore;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// Largest accepted decoded upload.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Base64 length of a `MAX_UPLOAD_BYTES` payload plus room for a `data:` URL header.
pub const MAX_ENCODED_LEN: usize = MAX_UPLOAD_BYTES.div_ceil(3) * 4 + 256;

/// Request body limit for the upload route (encoded payload plus JSON envelope).
pub const UPLOAD_BODY_LIMIT: usize = MAX_ENCODED_LEN + 64 * 1024;

const MAX_NAME_LEN: usize = 64;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoredFile {
    pub bucket: Bucket,
    pub path: String,
    /// Only set for public buckets.
    pub public_url: Option<String>,
}

/// Lower-cased file name restricted to `[a-z0-9._-]`; every other run of characters becomes one `-`.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut replaced = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c.to_ascii_lowercase());
            replaced = false;
        } else if !replaced {
            out.push('-');
            replaced = true;
        }
    }
    let trimmed = out.trim_matches('-');
    trimmed.chars().take(MAX_NAME_LEN).collect()
}

/// `<unix-millis>-<8 random alnum>[-<sanitized name>]`
pub fn object_key(original_name: Option<&str>) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    match original_name.map(sanitize_file_name).filter(|n| !n.is_empty()) {
        Some(name) => format!("{}-{}-{}", millis, suffix, name),
        None => format!("{}-{}", millis, suffix),
    }
}

/// Normalized object path inside the private downloads bucket.
pub fn private_object_path(path: &str) -> StorefrontResult<String> {
    let path = path.trim().trim_start_matches('/');
    if path.is_empty() {
        return Err(StorefrontError::validation("path is required"));
    }
    if path.contains("..") {
        return Err(StorefrontError::validation("path must not contain '..'"));
    }
    Ok(path.to_string())
}

/// Splits an optional `data:<mime>;base64,` prefix off the payload.
fn split_data_url(payload: &str) -> (Option<&str>, &str) {
    if let Some(rest) = payload.strip_prefix("data:") {
        if let Some((header, body)) = rest.split_once(',') {
            let mime = header.strip_suffix(";base64").unwrap_or(header);
            return (Some(mime).filter(|m| !m.is_empty()), body);
        }
    }
    (None, payload)
}

pub struct FileGateway {
    blobs: Arc<dyn BlobStore>,
}

impl FileGateway {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub async fn upload(
        &self,
        payload: &str,
        bucket: Bucket,
        original_name: Option<&str>,
        content_type: Option<&str>,
    ) -> StorefrontResult<StoredFile> {
        let payload = payload.trim();
        if payload.len() > MAX_ENCODED_LEN {
            return Err(StorefrontError::PayloadTooLarge {
                limit: MAX_UPLOAD_BYTES,
                actual: payload.len() / 4 * 3,
            });
        }
        let (embedded_type, encoded) = split_data_url(payload);
        if encoded.is_empty() {
            return Err(StorefrontError::validation("file payload is empty"));
        }
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| StorefrontError::validation(format!("file payload is not valid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(StorefrontError::validation("file payload is empty"));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(StorefrontError::PayloadTooLarge {
                limit: MAX_UPLOAD_BYTES,
                actual: bytes.len(),
            });
        }

        let content_type = content_type
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or(embedded_type)
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        let key = object_key(original_name);
        let size = bytes.len();
        let path = self.blobs.put(bucket, &key, bytes, content_type).await?;
        tracing::info!(bucket = %bucket, path = %path, size, "file uploaded");

        Ok(StoredFile {
            bucket,
            public_url: self.blobs.public_url(bucket, &path),
            path,
        })
    }

    /// Removes one object from the private downloads bucket.
    pub async fn delete_private(&self, path: &str) -> StorefrontResult<()> {
        let path = private_object_path(path)?;
        self.blobs
            .remove(Bucket::PrivateDownloads, std::slice::from_ref(&path))
            .await?;
        tracing::info!(path = %path, "private file removed");
        Ok(())
    }

    /// Best-effort removal of a deleted product's thumbnail and content file.
    /// Returns one message per failed removal.
    pub async fn remove_product_files(&self, product: &Product) -> Vec<String> {
        let mut targets = Vec::new();
        if let Some(url) = product.image_url.as_deref() {
            match self.blobs.path_from_public_url(Bucket::PublicAssets, url) {
                Some(path) => targets.push((Bucket::PublicAssets, path)),
                None => tracing::debug!(product = %product.id, url, "thumbnail is not in our bucket, skipped"),
            }
        }
        match private_object_path(&product.content_path) {
            Ok(path) => targets.push((Bucket::PrivateDownloads, path)),
            Err(e) => tracing::warn!(product = %product.id, error = %e, "content path skipped"),
        }

        let mut errors = Vec::new();
        for (bucket, path) in targets {
            if let Err(e) = self.blobs.remove(bucket, std::slice::from_ref(&path)).await {
                tracing::warn!(product = %product.id, bucket = %bucket, path = %path, error = %e, "file removal failed");
                errors.push(format!("{}/{}: {}", bucket, path, e));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::blobs::MemoryBlobStore;

    fn gateway() -> (FileGateway, Arc<MemoryBlobStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        (FileGateway::new(blobs.clone()), blobs)
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_file_name("My Cool File (1).ZIP"), "my-cool-file-1-.zip");
        assert_eq!(sanitize_file_name("ok_name-2.png"), "ok_name-2.png");
        assert_eq!(sanitize_file_name("///"), "");
        assert_eq!(sanitize_file_name(&"a".repeat(100)).len(), 64);
    }

    #[test]
    fn object_keys_have_timestamp_and_suffix() {
        let key = object_key(Some("Cover Art.png"));
        let parts: Vec<&str> = key.splitn(3, '-').collect();
        assert!(parts[0].parse::<i64>().is_ok());
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2], "cover-art.png");
        assert_eq!(object_key(None).split('-').count(), 2);
    }

    #[tokio::test]
    async fn uploads_data_url_into_public_bucket() {
        let (gw, blobs) = gateway();
        let payload = format!("data:image/png;base64,{}", STANDARD.encode(b"png-bytes"));
        let stored = gw
            .upload(&payload, Bucket::PublicAssets, Some("thumb.png"), None)
            .await
            .unwrap();
        assert!(stored.public_url.is_some());
        let object = blobs.get(Bucket::PublicAssets, &stored.path).await.unwrap();
        assert_eq!(object.bytes, b"png-bytes");
        assert_eq!(object.content_type, "image/png");
    }

    #[tokio::test]
    async fn private_uploads_have_no_public_url() {
        let (gw, _) = gateway();
        let stored = gw
            .upload(&STANDARD.encode(b"zip"), Bucket::PrivateDownloads, None, Some("application/zip"))
            .await
            .unwrap();
        assert!(stored.public_url.is_none());
    }

    #[tokio::test]
    async fn oversized_and_empty_payloads_never_reach_storage() {
        let (gw, blobs) = gateway();
        let too_big = STANDARD.encode(vec![0u8; MAX_UPLOAD_BYTES + 1]);
        assert!(matches!(
            gw.upload(&too_big, Bucket::Temp, None, None).await,
            Err(StorefrontError::PayloadTooLarge { .. })
        ));
        assert!(matches!(
            gw.upload("data:text/plain;base64,", Bucket::Temp, None, None).await,
            Err(StorefrontError::Validation { .. })
        ));
        assert!(gw.upload("%%%", Bucket::Temp, None, None).await.is_err());
        assert_eq!(blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn delete_private_rejects_traversal() {
        let (gw, _) = gateway();
        assert!(gw.delete_private("../secrets").await.is_err());
        assert!(gw.delete_private("  ").await.is_err());
        assert!(gw.delete_private("1700000000000-abcdefgh-pack.zip").await.is_ok());
    }
}
