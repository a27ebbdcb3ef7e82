//! Row store: products, purchases and download tokens.
//!
//! Two routines must be atomic inside the store itself, never a read-then-write in the caller:
//! - `decrement_stock`: decrement by one, fail with `Exhausted` when stock is already zero.
//! - `consume_download_token`: mark consumed only if unconsumed and unexpired.
//!
//! The Postgres backend expresses both as single conditional `UPDATE ... RETURNING` statements;
//! the in-memory backend runs them inside one critical section.

use crate::domain::model::{
    DownloadToken, NewProduct, NewPurchase, Product, ProductChanges, Purchase, TokenRejection,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryRowStore;
pub use postgres::PgRowStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// Conditional decrement found no stock left.
    #[error("stock exhausted")]
    Exhausted,
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RowStore: Send + Sync {
    /// Products of one tenant, newest first.
    async fn list_products(&self, tenant_id: &str, active: Option<bool>)
        -> StoreResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn get_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product>;
    /// Rewrites the editable columns if `updated_at` still equals `expected_updated_at`.
    ///
    /// Fails with `NotFound` when the row is gone and `Conflict` when the version moved.
    async fn update_product(
        &self,
        id: Uuid,
        tenant_id: &str,
        expected_updated_at: DateTime<Utc>,
        changes: ProductChanges,
    ) -> StoreResult<Product>;
    /// Flips the active flag, optionally guarded by the same version check as `update_product`.
    async fn set_product_active(
        &self,
        id: Uuid,
        tenant_id: &str,
        active: bool,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Product>;
    /// Removes the row. `Conflict` if purchases still reference it.
    async fn delete_product(&self, id: Uuid, tenant_id: &str) -> StoreResult<Product>;

    /// Atomic decrement with floor check. Returns the remaining stock.
    async fn decrement_stock(&self, product_id: Uuid) -> StoreResult<i64>;
    /// Compensating increment used to roll back a decrement.
    async fn increment_stock(&self, product_id: Uuid) -> StoreResult<i64>;

    async fn find_purchase_by_tx(&self, tx_hash: &str) -> StoreResult<Option<Purchase>>;
    /// `Conflict` when a purchase with the same transaction hash already exists.
    async fn insert_purchase(&self, purchase: NewPurchase) -> StoreResult<Purchase>;
    /// Purchases of one buyer, newest first.
    async fn list_purchases_by_buyer(&self, buyer_address: &str) -> StoreResult<Vec<Purchase>>;

    /// Creates a fresh unconsumed token expiring `ttl` from now.
    async fn create_download_token(
        &self,
        purchase_id: Uuid,
        product_id: Uuid,
        ttl: Duration,
    ) -> StoreResult<DownloadToken>;
    /// Atomic verify-and-consume. Expiry is reported before prior consumption.
    async fn consume_download_token(
        &self,
        token: &str,
    ) -> StoreResult<Result<DownloadToken, TokenRejection>>;
    async fn list_tokens_for_purchases(
        &self,
        purchase_ids: &[Uuid],
    ) -> StoreResult<Vec<DownloadToken>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
