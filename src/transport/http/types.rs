use crate::app::{CatalogService, ClaimHistory, FileGateway, PurchaseService};
use crate::infra::chain::{ChainRpc, PaymentFilter};
use crate::infra::StorefrontConfig;
use crate::storage::{BlobStore, RowStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<StorefrontConfig>,
    pub rows: Arc<dyn RowStore>,
    pub catalog: Arc<CatalogService>,
    pub files: Arc<FileGateway>,
    pub purchases: Arc<PurchaseService>,
    pub claims: Arc<ClaimHistory>,
}

impl AppState {
    /// Wires every service over the given collaborators.
    pub fn new(
        config: Arc<StorefrontConfig>,
        rows: Arc<dyn RowStore>,
        blobs: Arc<dyn BlobStore>,
        chain: Arc<dyn ChainRpc>,
    ) -> Self {
        let files = Arc::new(FileGateway::new(blobs));
        let payment_filter = PaymentFilter {
            token_contract: config.payment_token_address,
            recipient: config.merchant_address,
        };
        Self {
            catalog: Arc::new(CatalogService::new(rows.clone(), files.clone())),
            purchases: Arc::new(PurchaseService::new(
                rows.clone(),
                chain.clone(),
                files.clone(),
                payment_filter,
            )),
            claims: Arc::new(ClaimHistory::new(rows.clone(), chain)),
            files,
            rows,
            config,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                data: Some(value),
                error: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(format!("failed to serialize response: {}", e)),
            },
        }
    }

    pub fn failure(data: Option<JsonValue>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
        }
    }
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListProductsQuery {
    /// Tenant whose catalog to list.
    pub tenant_id: Option<String>,
    /// Only active (`true`) or only inactive (`false`) products.
    pub active: Option<bool>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteProductQuery {
    /// `true` removes the row and its files; default is a soft delete.
    #[serde(default)]
    pub hard: bool,
    /// Optional optimistic check for soft deletes.
    pub expected_updated_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct UploadFileRequest {
    /// Base64 payload, optionally as a `data:<mime>;base64,` URL.
    pub file: String,
    /// `public-assets`, `private-downloads`, `logos`, `avatars` or `temp`.
    pub bucket: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct DeleteFileRequest {
    /// Object path inside the private downloads bucket.
    pub path: String,
}
