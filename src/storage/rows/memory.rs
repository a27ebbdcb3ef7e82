//! In-memory row store.
//!
//! Not durable; all state is lost on restart. Used for tests and local development
//! (`STOREFRONT_STORE=memory`). Every operation runs under one mutex, so the conditional
//! routines are atomic with respect to each other.

use super::{RowStore, StoreError, StoreResult};
use crate::domain::clock;
use crate::domain::model::{
    generate_token, DownloadToken, NewProduct, NewPurchase, Product, ProductChanges, Purchase,
    TokenRejection,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    products: HashMap<Uuid, Product>,
    purchases: HashMap<Uuid, Purchase>,
    purchases_by_tx: HashMap<String, Uuid>,
    tokens: HashMap<String, DownloadToken>,
}

#[derive(Default)]
pub struct MemoryRowStore {
    state: Mutex<State>,
    fail_purchase_inserts: AtomicBool,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded purchases (test helper).
    pub async fn purchase_count(&self) -> usize {
        self.state.lock().await.purchases.len()
    }

    /// Makes every subsequent `insert_purchase` fail (exercises stock rollback).
    pub fn fail_purchase_inserts(&self, fail: bool) {
        self.fail_purchase_inserts.store(fail, Ordering::SeqCst);
    }
}

fn owned_mut<'a>(
    state: &'a mut State,
    id: Uuid,
    tenant_id: &str,
) -> StoreResult<&'a mut Product> {
    match state.products.get_mut(&id) {
        Some(p) if p.tenant_id == tenant_id => Ok(p),
        _ => Err(StoreError::NotFound(format!("product {}", id))),
    }
}

fn check_version(product: &Product, expected: Option<DateTime<Utc>>) -> StoreResult<()> {
    match expected {
        Some(v) if v != product.updated_at => Err(StoreError::Conflict(format!(
            "product {} was modified at {}",
            product.id,
            product.updated_at.to_rfc3339()
        ))),
        _ => Ok(()),
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn list_products(
        &self,
        tenant_id: &str,
        active: Option<bool>,
    ) -> StoreResult<Vec<Product>> {
        let state = self.state.lock().await;
        let mut items: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .filter(|p| active.map_or(true, |a| p.active == a))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let now = clock::now();
        let row = Product {
            id: Uuid::new_v4(),
            tenant_id: product.tenant_id,
            name: product.name,
            description: product.description,
            content_path: product.content_path,
            image_url: product.image_url,
            price_token: product.price_token,
            price_amount: product.price_amount,
            stock: product.stock,
            unlimited: product.unlimited,
            active: product.active,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .products
            .insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_product(
        &self,
        id: Uuid,
        tenant_id: &str,
        expected_updated_at: DateTime<Utc>,
        changes: ProductChanges,
    ) -> StoreResult<Product> {
        let mut state = self.state.lock().await;
        let product = owned_mut(&mut state, id, tenant_id)?;
        check_version(product, Some(expected_updated_at))?;
        product.name = changes.name;
        product.description = changes.description;
        product.content_path = changes.content_path;
        product.image_url = changes.image_url;
        product.price_token = changes.price_token;
        product.price_amount = changes.price_amount;
        product.stock = changes.stock;
        product.unlimited = changes.unlimited;
        product.active = changes.active;
        product.updated_at = clock::next_version(product.updated_at);
        Ok(product.clone())
    }

    async fn set_product_active(
        &self,
        id: Uuid,
        tenant_id: &str,
        active: bool,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Product> {
        let mut state = self.state.lock().await;
        let product = owned_mut(&mut state, id, tenant_id)?;
        check_version(product, expected_updated_at)?;
        product.active = active;
        product.updated_at = clock::next_version(product.updated_at);
        Ok(product.clone())
    }

    async fn delete_product(&self, id: Uuid, tenant_id: &str) -> StoreResult<Product> {
        let mut state = self.state.lock().await;
        owned_mut(&mut state, id, tenant_id)?;
        if state.purchases.values().any(|p| p.product_id == id) {
            return Err(StoreError::Conflict(format!(
                "product {} has recorded purchases",
                id
            )));
        }
        state
            .products
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("product {}", id)))
    }

    async fn decrement_stock(&self, product_id: Uuid) -> StoreResult<i64> {
        let mut state = self.state.lock().await;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {}", product_id)))?;
        if product.unlimited || product.stock <= 0 {
            return Err(StoreError::Exhausted);
        }
        product.stock -= 1;
        Ok(product.stock)
    }

    async fn increment_stock(&self, product_id: Uuid) -> StoreResult<i64> {
        let mut state = self.state.lock().await;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {}", product_id)))?;
        product.stock += 1;
        Ok(product.stock)
    }

    async fn find_purchase_by_tx(&self, tx_hash: &str) -> StoreResult<Option<Purchase>> {
        let state = self.state.lock().await;
        Ok(state
            .purchases_by_tx
            .get(tx_hash)
            .and_then(|id| state.purchases.get(id))
            .cloned())
    }

    async fn insert_purchase(&self, purchase: NewPurchase) -> StoreResult<Purchase> {
        if self.fail_purchase_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unexpected(anyhow::anyhow!(
                "purchase insert failed for transaction {}",
                purchase.tx_hash
            )));
        }
        let mut state = self.state.lock().await;
        if state.purchases_by_tx.contains_key(&purchase.tx_hash) {
            return Err(StoreError::Conflict(format!(
                "purchase for transaction {} already exists",
                purchase.tx_hash
            )));
        }
        if !state.products.contains_key(&purchase.product_id) {
            return Err(StoreError::NotFound(format!("product {}", purchase.product_id)));
        }
        let row = Purchase {
            id: Uuid::new_v4(),
            product_id: purchase.product_id,
            buyer_address: purchase.buyer_address,
            tx_hash: purchase.tx_hash,
            amount_paid: purchase.amount_paid,
            created_at: clock::now(),
        };
        state.purchases_by_tx.insert(row.tx_hash.clone(), row.id);
        state.purchases.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_purchases_by_buyer(&self, buyer_address: &str) -> StoreResult<Vec<Purchase>> {
        let state = self.state.lock().await;
        let mut items: Vec<Purchase> = state
            .purchases
            .values()
            .filter(|p| p.buyer_address == buyer_address)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn create_download_token(
        &self,
        purchase_id: Uuid,
        product_id: Uuid,
        ttl: Duration,
    ) -> StoreResult<DownloadToken> {
        let mut state = self.state.lock().await;
        if !state.purchases.contains_key(&purchase_id) {
            return Err(StoreError::NotFound(format!("purchase {}", purchase_id)));
        }
        let now = clock::now();
        let row = DownloadToken {
            id: Uuid::new_v4(),
            purchase_id,
            product_id,
            token: generate_token(),
            consumed: false,
            expires_at: now + ttl,
            consumed_at: None,
            created_at: now,
        };
        state.tokens.insert(row.token.clone(), row.clone());
        Ok(row)
    }

    async fn consume_download_token(
        &self,
        token: &str,
    ) -> StoreResult<Result<DownloadToken, TokenRejection>> {
        let mut state = self.state.lock().await;
        let Some(row) = state.tokens.get_mut(token) else {
            return Ok(Err(TokenRejection::NotFound));
        };
        let now = clock::now();
        if row.is_expired_at(now) {
            return Ok(Err(TokenRejection::Expired));
        }
        if row.consumed {
            return Ok(Err(TokenRejection::AlreadyUsed));
        }
        row.consumed = true;
        row.consumed_at = Some(now);
        Ok(Ok(row.clone()))
    }

    async fn list_tokens_for_purchases(
        &self,
        purchase_ids: &[Uuid],
    ) -> StoreResult<Vec<DownloadToken>> {
        let state = self.state.lock().await;
        Ok(state
            .tokens
            .values()
            .filter(|t| purchase_ids.contains(&t.purchase_id))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
