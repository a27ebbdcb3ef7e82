//! Product catalog: tenant-scoped listing and admin writes.
//!
//! Every mutating call re-reads the product and checks its tenant before writing, so a forged
//! product id from another tenant is refused even though the id itself is valid.

use crate::app::files::{private_object_path, FileGateway};
use crate::domain::model::{NewProduct, Product, ProductChanges};
use crate::domain::money::parse_price_amount;
use crate::domain::{StorefrontError, StorefrontResult};
use crate::storage::{RowStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Create-or-update payload. Without `id` a product is created.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProductInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content_path: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price_token: Option<String>,
    /// Positive integer string in the token's smallest unit.
    #[serde(default)]
    pub price_amount: Option<String>,
    /// Number or numeric string; required unless `unlimited`.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub stock: Option<JsonValue>,
    #[serde(default)]
    pub unlimited: bool,
    #[serde(default)]
    pub active: Option<bool>,
    /// Last `updated_at` the caller saw; required for updates.
    #[serde(default)]
    pub expected_updated_at: Option<DateTime<Utc>>,
}

/// Outcome of a hard delete. File removal failures do not undo the row deletion.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeletionReport {
    pub product: Product,
    pub removal_errors: Vec<String>,
}

struct ValidatedProduct {
    name: String,
    description: String,
    content_path: String,
    image_url: Option<String>,
    price_token: String,
    price_amount: String,
    stock: i64,
    unlimited: bool,
}

fn required(value: &Option<String>, field: &str) -> StorefrontResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StorefrontError::validation(format!("{} is required", field)))
}

fn parse_stock(value: Option<&JsonValue>) -> StorefrontResult<i64> {
    let invalid = || StorefrontError::validation("stock must be a non-negative integer");
    let stock = match value {
        None | Some(JsonValue::Null) => {
            return Err(StorefrontError::validation(
                "stock is required unless the product is unlimited",
            ))
        }
        Some(JsonValue::Number(n)) => n.as_i64().ok_or_else(invalid)?,
        Some(JsonValue::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        Some(_) => return Err(invalid()),
    };
    if stock < 0 {
        return Err(invalid());
    }
    Ok(stock)
}

fn validate(input: &ProductInput) -> StorefrontResult<ValidatedProduct> {
    let name = required(&input.name, "name")?;
    let content_path = private_object_path(&required(&input.content_path, "content_path")?)
        .map_err(|_| StorefrontError::validation("content_path must be a path inside the downloads bucket"))?;
    let price_token = required(&input.price_token, "price_token")?;
    let raw_price = required(&input.price_amount, "price_amount")?;
    let price = parse_price_amount(&raw_price)
        .map_err(|e| StorefrontError::validation_code("INVALID_PRICE", e))?;
    let stock = if input.unlimited {
        0
    } else {
        parse_stock(input.stock.as_ref())?
    };
    Ok(ValidatedProduct {
        name,
        description: input.description.clone().unwrap_or_default().trim().to_string(),
        content_path,
        image_url: input
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        price_token,
        price_amount: price.to_string(),
        stock,
        unlimited: input.unlimited,
    })
}

fn require_tenant(tenant_id: &str) -> StorefrontResult<&str> {
    let tenant_id = tenant_id.trim();
    if tenant_id.is_empty() {
        return Err(StorefrontError::validation("tenant id is required"));
    }
    Ok(tenant_id)
}

fn version_conflict(err: StoreError) -> StorefrontError {
    match err {
        StoreError::Conflict(_) => StorefrontError::conflict(
            "STALE_UPDATE",
            "product was modified since it was loaded; reload and retry",
        ),
        StoreError::NotFound(_) => {
            StorefrontError::NotFound("product not found (it may have been deleted)".to_string())
        }
        other => other.into(),
    }
}

pub struct CatalogService {
    rows: Arc<dyn RowStore>,
    files: Arc<FileGateway>,
}

impl CatalogService {
    pub fn new(rows: Arc<dyn RowStore>, files: Arc<FileGateway>) -> Self {
        Self { rows, files }
    }

    pub async fn list(&self, tenant_id: &str, active: Option<bool>) -> StorefrontResult<Vec<Product>> {
        let tenant_id = require_tenant(tenant_id)?;
        Ok(self.rows.list_products(tenant_id, active).await?)
    }

    pub async fn get(&self, product_id: Uuid) -> StorefrontResult<Product> {
        self.rows
            .get_product(product_id)
            .await?
            .ok_or_else(|| StorefrontError::NotFound(format!("product {} not found", product_id)))
    }

    /// Loads a product and checks it belongs to `tenant_id`.
    async fn owned(&self, tenant_id: &str, product_id: Uuid) -> StorefrontResult<Product> {
        let product = self.get(product_id).await?;
        if product.tenant_id != tenant_id {
            tracing::warn!(
                product = %product_id,
                tenant = tenant_id,
                owner = %product.tenant_id,
                "cross-tenant product mutation refused"
            );
            return Err(StorefrontError::Forbidden(
                "product belongs to another tenant".to_string(),
            ));
        }
        Ok(product)
    }

    pub async fn upsert(&self, tenant_id: &str, input: ProductInput) -> StorefrontResult<Product> {
        let tenant_id = require_tenant(tenant_id)?;
        let fields = validate(&input)?;

        let Some(product_id) = input.id else {
            let created = self
                .rows
                .insert_product(NewProduct {
                    tenant_id: tenant_id.to_string(),
                    name: fields.name,
                    description: fields.description,
                    content_path: fields.content_path,
                    image_url: fields.image_url,
                    price_token: fields.price_token,
                    price_amount: fields.price_amount,
                    stock: fields.stock,
                    unlimited: fields.unlimited,
                    active: input.active.unwrap_or(true),
                })
                .await?;
            tracing::info!(product = %created.id, tenant = tenant_id, "product created");
            return Ok(created);
        };

        let expected = input.expected_updated_at.ok_or_else(|| {
            StorefrontError::validation("expected_updated_at is required when updating a product")
        })?;
        let current = self.owned(tenant_id, product_id).await?;
        let updated = self
            .rows
            .update_product(
                product_id,
                tenant_id,
                expected,
                ProductChanges {
                    name: fields.name,
                    description: fields.description,
                    content_path: fields.content_path,
                    image_url: fields.image_url,
                    price_token: fields.price_token,
                    price_amount: fields.price_amount,
                    stock: fields.stock,
                    unlimited: fields.unlimited,
                    active: input.active.unwrap_or(current.active),
                },
            )
            .await
            .map_err(version_conflict)?;
        tracing::info!(product = %updated.id, tenant = tenant_id, "product updated");
        Ok(updated)
    }

    /// Soft delete.
    pub async fn deactivate(
        &self,
        tenant_id: &str,
        product_id: Uuid,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> StorefrontResult<Product> {
        let tenant_id = require_tenant(tenant_id)?;
        self.owned(tenant_id, product_id).await?;
        let product = self
            .rows
            .set_product_active(product_id, tenant_id, false, expected_updated_at)
            .await
            .map_err(version_conflict)?;
        tracing::info!(product = %product_id, tenant = tenant_id, "product deactivated");
        Ok(product)
    }

    /// Hard delete, then best-effort removal of the thumbnail and content file.
    pub async fn delete(&self, tenant_id: &str, product_id: Uuid) -> StorefrontResult<DeletionReport> {
        let tenant_id = require_tenant(tenant_id)?;
        self.owned(tenant_id, product_id).await?;
        let product = self
            .rows
            .delete_product(product_id, tenant_id)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => StorefrontError::conflict(
                    "PRODUCT_HAS_PURCHASES",
                    "product has recorded purchases; deactivate it instead",
                ),
                other => other.into(),
            })?;
        let removal_errors = self.files.remove_product_files(&product).await;
        tracing::info!(
            product = %product_id,
            tenant = tenant_id,
            removal_failures = removal_errors.len(),
            "product deleted"
        );
        Ok(DeletionReport {
            product,
            removal_errors,
        })
    }
}
