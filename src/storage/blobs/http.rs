//! Blob store backed by a Supabase-style storage REST API.
//!
//! Every request carries the privileged service key; this type only exists inside the server.

use super::{BlobError, BlobResult, BlobStore};
use crate::domain::model::Bucket;
use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;

#[derive(Clone)]
struct Endpoint {
    base_url: String,
    service_key: String,
}

pub struct HttpBlobStore {
    client: reqwest::Client,
    endpoint: Option<Endpoint>,
}

#[derive(Deserialize)]
struct BucketInfo {
    name: String,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl HttpBlobStore {
    /// `None` for either setting leaves the store unconfigured: calls fail with `NotConfigured`.
    pub fn new(base_url: Option<String>, service_key: Option<String>) -> Self {
        let endpoint = match (base_url, service_key) {
            (Some(base_url), Some(service_key)) => Some(Endpoint {
                base_url: base_url.trim_end_matches('/').to_string(),
                service_key,
            }),
            _ => None,
        };
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    fn endpoint(&self) -> BlobResult<&Endpoint> {
        self.endpoint.as_ref().ok_or(BlobError::NotConfigured)
    }

    fn object_url(endpoint: &Endpoint, bucket: Bucket, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            endpoint.base_url,
            bucket.name(),
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, endpoint: &Endpoint, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&endpoint.service_key)
            .header("apikey", &endpoint.service_key)
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Names of the buckets visible to the service key.
    pub async fn list_buckets(&self) -> BlobResult<Vec<String>> {
        let endpoint = self.endpoint()?;
        let req = self
            .client
            .get(format!("{}/storage/v1/bucket", endpoint.base_url));
        let resp = self.authorized(endpoint, req).send().await?;
        let buckets: Vec<BucketInfo> = Self::check(resp).await?.json().await?;
        Ok(buckets.into_iter().map(|b| b.name).collect())
    }

    async fn check(resp: reqwest::Response) -> BlobResult<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(BlobError::Rejected { status, body })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BlobResult<String> {
        let endpoint = self.endpoint()?;
        let req = self
            .client
            .post(Self::object_url(endpoint, bucket, key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes);
        let resp = self.authorized(endpoint, req).send().await?;
        Self::check(resp).await?;
        Ok(key.to_string())
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> Option<String> {
        if !bucket.is_public() {
            return None;
        }
        let endpoint = self.endpoint.as_ref()?;
        Some(format!(
            "{}/storage/v1/object/public/{}/{}",
            endpoint.base_url,
            bucket.name(),
            path.trim_start_matches('/')
        ))
    }

    async fn signed_url(&self, bucket: Bucket, path: &str, ttl: Duration) -> BlobResult<String> {
        let endpoint = self.endpoint()?;
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            endpoint.base_url,
            bucket.name(),
            path.trim_start_matches('/')
        );
        let req = self
            .client
            .post(url)
            .json(&json!({ "expiresIn": ttl.num_seconds() }));
        let resp = self.authorized(endpoint, req).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BlobError::NotFound {
                bucket,
                path: path.to_string(),
            });
        }
        let signed: SignResponse = Self::check(resp).await?.json().await?;
        // The API answers with a path relative to /storage/v1.
        if signed.signed_url.starts_with("http") {
            Ok(signed.signed_url)
        } else {
            Ok(format!(
                "{}/storage/v1/{}",
                endpoint.base_url,
                signed.signed_url.trim_start_matches('/')
            ))
        }
    }

    async fn remove(&self, bucket: Bucket, paths: &[String]) -> BlobResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let endpoint = self.endpoint()?;
        let url = format!("{}/storage/v1/object/{}", endpoint.base_url, bucket.name());
        let req = self
            .client
            .delete(url)
            .json(&json!({ "prefixes": paths }));
        let resp = self.authorized(endpoint, req).send().await?;
        Self::check(resp).await?;
        Ok(())
    }
}
