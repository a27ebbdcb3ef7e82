//! Purchase and entitlement flow.
//!
//! Each purchase request walks verified-transaction -> reserved stock -> recorded purchase ->
//! issued token in a single call. Nothing about the attempt is persisted until the purchase row
//! is written, and any failing step aborts the remainder.

use crate::app::files::FileGateway;
use crate::domain::model::{Bucket, DownloadToken, NewPurchase, Product, Purchase};
use crate::domain::money::{address_string, covers_price, parse_address, parse_price_amount, parse_tx_hash, tx_hash_string};
use crate::domain::{StorefrontError, StorefrontResult};
use crate::infra::chain::{find_payment, ChainRpc, PaymentFilter};
use crate::storage::{RowStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifetime of a token issued by the token flow.
pub fn token_ttl() -> Duration {
    Duration::hours(24)
}

/// Lifetime of the token issued (and consumed) by the direct flow.
pub fn direct_token_ttl() -> Duration {
    Duration::minutes(10)
}

/// Lifetime of every signed download URL.
pub fn signed_url_ttl() -> Duration {
    Duration::minutes(10)
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PurchaseRequest {
    pub product_id: Uuid,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub tx_hash: String,
    pub buyer_address: String,
    /// Client-reported amount. Advisory: the on-chain transfer amount is what gets recorded.
    #[serde(default)]
    pub amount: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PurchaseReceipt {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub purchase_id: Uuid,
    pub product_id: Uuid,
    /// True when the transaction had already been recorded by an earlier request.
    pub already_recorded: bool,
    /// `None` for unlimited products.
    pub remaining_stock: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DirectDownload {
    pub download_url: String,
    pub url_expires_at: DateTime<Utc>,
    pub purchase_id: Uuid,
    pub product_id: Uuid,
    pub already_recorded: bool,
    pub remaining_stock: Option<i64>,
}

/// A consumed token resolved to a fresh signed URL.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub url: String,
    pub product_id: Uuid,
}

struct Recorded {
    product: Product,
    purchase: Purchase,
    token: DownloadToken,
    already_recorded: bool,
    remaining_stock: Option<i64>,
}

pub struct PurchaseService {
    rows: Arc<dyn RowStore>,
    chain: Arc<dyn ChainRpc>,
    files: Arc<FileGateway>,
    payment_filter: PaymentFilter,
}

impl PurchaseService {
    pub fn new(
        rows: Arc<dyn RowStore>,
        chain: Arc<dyn ChainRpc>,
        files: Arc<FileGateway>,
        payment_filter: PaymentFilter,
    ) -> Self {
        Self {
            rows,
            chain,
            files,
            payment_filter,
        }
    }

    /// Token flow: records the purchase and issues a 24 hour download token.
    pub async fn initiate(&self, request: PurchaseRequest) -> StorefrontResult<PurchaseReceipt> {
        let recorded = self.record(&request, token_ttl()).await?;
        Ok(PurchaseReceipt {
            token: recorded.token.token,
            expires_at: recorded.token.expires_at,
            purchase_id: recorded.purchase.id,
            product_id: recorded.product.id,
            already_recorded: recorded.already_recorded,
            remaining_stock: recorded.remaining_stock,
        })
    }

    /// Direct flow: records the purchase, consumes a short-lived token right away and hands back a
    /// signed URL for the content.
    pub async fn initiate_direct(&self, request: PurchaseRequest) -> StorefrontResult<DirectDownload> {
        let recorded = self.record(&request, direct_token_ttl()).await?;
        let consumed = self
            .rows
            .consume_download_token(&recorded.token.token)
            .await??;
        let ttl = signed_url_ttl();
        let download_url = self
            .files
            .blobs()
            .signed_url(Bucket::PrivateDownloads, &recorded.product.content_path, ttl)
            .await?;
        tracing::info!(purchase = %consumed.purchase_id, product = %consumed.product_id, "direct download issued");
        Ok(DirectDownload {
            download_url,
            url_expires_at: Utc::now() + ttl,
            purchase_id: recorded.purchase.id,
            product_id: recorded.product.id,
            already_recorded: recorded.already_recorded,
            remaining_stock: recorded.remaining_stock,
        })
    }

    /// Consumes `token` and returns a signed URL for the product's private content.
    pub async fn redeem(&self, token: &str) -> StorefrontResult<Redemption> {
        let token = token.trim();
        if token.is_empty() {
            return Err(StorefrontError::NotFound("download token not found".to_string()));
        }
        let consumed = self.rows.consume_download_token(token).await??;
        let product = self
            .rows
            .get_product(consumed.product_id)
            .await?
            .ok_or_else(|| StorefrontError::NotFound("purchased product no longer exists".to_string()))?;
        let url = self
            .files
            .blobs()
            .signed_url(Bucket::PrivateDownloads, &product.content_path, signed_url_ttl())
            .await?;
        tracing::info!(purchase = %consumed.purchase_id, product = %product.id, "download token redeemed");
        Ok(Redemption {
            url,
            product_id: product.id,
        })
    }

    async fn load_product(&self, request: &PurchaseRequest) -> StorefrontResult<Product> {
        let not_found = || StorefrontError::NotFound(format!("product {} not found", request.product_id));
        let product = self
            .rows
            .get_product(request.product_id)
            .await?
            .ok_or_else(not_found)?;
        let tenant_matches = request
            .tenant_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map_or(true, |t| t == product.tenant_id);
        if !product.active || !tenant_matches {
            return Err(not_found());
        }
        Ok(product)
    }

    async fn record(&self, request: &PurchaseRequest, ttl: Duration) -> StorefrontResult<Recorded> {
        let tx_hash = parse_tx_hash(&request.tx_hash)
            .map_err(|e| StorefrontError::validation_code("INVALID_TX_HASH", e))?;
        let tx_key = tx_hash_string(&tx_hash);
        let buyer = parse_address(&request.buyer_address)
            .map_err(|e| StorefrontError::validation_code("INVALID_ADDRESS", e))?;
        let reported_amount = request
            .amount
            .as_deref()
            .map(parse_price_amount)
            .transpose()
            .map_err(|e| StorefrontError::validation_code("INVALID_AMOUNT", e))?;

        let buyer_key = address_string(&buyer);

        let product = self.load_product(request).await?;
        let existing = self.rows.find_purchase_by_tx(&tx_key).await?;
        if let Some(previous) = &existing {
            if previous.product_id != product.id {
                return Err(tx_already_used());
            }
            if previous.buyer_address != buyer_key {
                return Err(payer_mismatch());
            }
        } else if product.is_sold_out() {
            return Err(StorefrontError::SoldOut);
        }

        let receipt = self
            .chain
            .transaction_receipt(tx_hash)
            .await?
            .ok_or_else(|| {
                StorefrontError::validation_code("TX_NOT_FOUND", "transaction not found on chain")
            })?;
        if !receipt.success {
            return Err(StorefrontError::validation_code("TX_FAILED", "transaction failed on chain"));
        }
        let payment = find_payment(&receipt, &self.payment_filter).ok_or_else(|| {
            StorefrontError::validation_code(
                "PAYMENT_NOT_FOUND",
                "no matching token transfer found in transaction",
            )
        })?;
        if payment.from != buyer {
            tracing::warn!(tx = %tx_key, payer = %payment.from, claimed = %buyer, "purchase claimed by a non-payer");
            return Err(payer_mismatch());
        }
        let price = parse_price_amount(&product.price_amount)
            .map_err(|e| StorefrontError::upstream("row store", format!("stored price is invalid: {}", e)))?;
        if !covers_price(payment.amount, price) {
            return Err(StorefrontError::validation_code(
                "UNDERPAID",
                format!("paid {} but the price is {}", payment.amount, price),
            ));
        }
        if reported_amount.is_some_and(|a| a != payment.amount) {
            tracing::debug!(tx = %tx_key, reported = ?reported_amount, on_chain = %payment.amount, "client amount differs from transfer");
        }

        let (purchase, already_recorded, remaining_stock) = match existing {
            Some(previous) => (previous, true, product.remaining_stock()),
            None => {
                let new_purchase = NewPurchase {
                    product_id: product.id,
                    buyer_address: buyer_key,
                    tx_hash: tx_key.clone(),
                    amount_paid: payment.amount.to_string(),
                };
                self.reserve_and_insert(&product, new_purchase).await?
            }
        };

        let token = self
            .rows
            .create_download_token(purchase.id, product.id, ttl)
            .await?;
        tracing::info!(
            purchase = %purchase.id,
            product = %product.id,
            tx = %tx_key,
            already_recorded,
            "download token issued"
        );
        Ok(Recorded {
            product,
            purchase,
            token,
            already_recorded,
            remaining_stock,
        })
    }

    /// Decrements stock (finite products only), then writes the purchase row. A duplicate tx
    /// hash from a concurrent request returns the stock and reuses that request's row.
    async fn reserve_and_insert(
        &self,
        product: &Product,
        new_purchase: NewPurchase,
    ) -> StorefrontResult<(Purchase, bool, Option<i64>)> {
        let reserved = if product.unlimited {
            None
        } else {
            Some(self.rows.decrement_stock(product.id).await.map_err(|e| match e {
                StoreError::Exhausted | StoreError::NotFound(_) => StorefrontError::SoldOut,
                other => other.into(),
            })?)
        };

        let tx_key = new_purchase.tx_hash.clone();
        let buyer_key = new_purchase.buyer_address.clone();
        match self.rows.insert_purchase(new_purchase).await {
            Ok(purchase) => Ok((purchase, false, reserved)),
            Err(StoreError::Conflict(_)) => {
                let remaining = self.release(product, reserved).await;
                let previous = self
                    .rows
                    .find_purchase_by_tx(&tx_key)
                    .await?
                    .ok_or_else(|| {
                        StorefrontError::upstream("row store", "duplicate purchase vanished after conflict")
                    })?;
                if previous.product_id != product.id {
                    return Err(tx_already_used());
                }
                if previous.buyer_address != buyer_key {
                    return Err(payer_mismatch());
                }
                Ok((previous, true, remaining))
            }
            Err(other) => {
                self.release(product, reserved).await;
                Err(other.into())
            }
        }
    }

    /// Best-effort return of a reserved unit. Returns the stock after the increment.
    async fn release(&self, product: &Product, reserved: Option<i64>) -> Option<i64> {
        reserved?;
        match self.rows.increment_stock(product.id).await {
            Ok(stock) => Some(stock),
            Err(e) => {
                tracing::error!(product = %product.id, error = %e, "failed to return reserved stock");
                None
            }
        }
    }
}

fn tx_already_used() -> StorefrontError {
    StorefrontError::conflict(
        "TX_ALREADY_USED",
        "transaction was already used to purchase a different product",
    )
}

fn payer_mismatch() -> StorefrontError {
    StorefrontError::validation_code(
        "PAYER_MISMATCH",
        "buyer address did not send the payment in this transaction",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::NewProduct;
    use crate::infra::chain::{ReceiptLog, StaticChainRpc, TxReceipt};
    use crate::storage::blobs::{BlobStore, MemoryBlobStore};
    use crate::storage::rows::MemoryRowStore;
    use alloy::primitives::{Address, B256, U256};

    fn token() -> Address {
        Address::repeat_byte(0x70)
    }

    fn merchant() -> Address {
        Address::repeat_byte(0x4d)
    }

    fn buyer() -> Address {
        Address::repeat_byte(0xb0)
    }

    struct Fixture {
        service: PurchaseService,
        rows: Arc<MemoryRowStore>,
        chain: Arc<StaticChainRpc>,
    }

    async fn fixture() -> Fixture {
        let rows = Arc::new(MemoryRowStore::new());
        let chain = Arc::new(StaticChainRpc::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs
            .put(Bucket::PrivateDownloads, "pack.zip", vec![7; 4], "application/zip")
            .await
            .unwrap();
        let service = PurchaseService::new(
            rows.clone(),
            chain.clone(),
            Arc::new(FileGateway::new(blobs)),
            PaymentFilter {
                token_contract: Some(token()),
                recipient: Some(merchant()),
            },
        );
        Fixture { service, rows, chain }
    }

    async fn product(rows: &MemoryRowStore, stock: i64, unlimited: bool) -> Product {
        rows.insert_product(NewProduct {
            tenant_id: "t1".to_string(),
            name: "Pack".to_string(),
            description: String::new(),
            content_path: "pack.zip".to_string(),
            image_url: None,
            price_token: "USDC".to_string(),
            price_amount: "1000".to_string(),
            stock,
            unlimited,
            active: true,
        })
        .await
        .unwrap()
    }

    fn paid(chain: &StaticChainRpc, n: u8, amount: u64) -> String {
        let hash = B256::repeat_byte(n);
        chain.set_receipt(
            hash,
            TxReceipt {
                success: true,
                logs: vec![ReceiptLog::transfer(token(), buyer(), merchant(), U256::from(amount))],
            },
        );
        tx_hash_string(&hash)
    }

    fn request(product_id: Uuid, tx_hash: String) -> PurchaseRequest {
        PurchaseRequest {
            product_id,
            tenant_id: None,
            tx_hash,
            buyer_address: format!("{:#x}", buyer()),
            amount: None,
        }
    }

    #[tokio::test]
    async fn price_boundary_is_exact() {
        let f = fixture().await;
        let p = product(&f.rows, 5, false).await;
        let short = paid(&f.chain, 1, 999);
        let err = f.service.initiate(request(p.id, short)).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation { code: "UNDERPAID", .. }));

        let exact = paid(&f.chain, 2, 1000);
        assert!(f.service.initiate(request(p.id, exact)).await.is_ok());
        let over = paid(&f.chain, 3, 5000);
        let receipt = f.service.initiate(request(p.id, over)).await.unwrap();
        assert_eq!(receipt.remaining_stock, Some(3));
    }

    #[tokio::test]
    async fn same_transaction_is_idempotent() {
        let f = fixture().await;
        let p = product(&f.rows, 1, false).await;
        let tx = paid(&f.chain, 1, 1000);

        let first = f.service.initiate(request(p.id, tx.clone())).await.unwrap();
        let second = f.service.initiate(request(p.id, tx)).await.unwrap();
        assert!(!first.already_recorded);
        assert!(second.already_recorded);
        assert_eq!(first.purchase_id, second.purchase_id);
        assert_ne!(first.token, second.token);
        assert_eq!(f.rows.purchase_count().await, 1);
        assert_eq!(f.rows.get_product(p.id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn sold_out_is_detected_before_the_chain_is_queried() {
        let f = fixture().await;
        let p = product(&f.rows, 1, false).await;
        let first = paid(&f.chain, 1, 1000);
        f.service.initiate(request(p.id, first)).await.unwrap();
        let calls = f.chain.calls();

        let second = paid(&f.chain, 2, 1000);
        let err = f.service.initiate(request(p.id, second)).await.unwrap_err();
        assert!(matches!(err, StorefrontError::SoldOut));
        assert_eq!(f.chain.calls(), calls);
    }

    #[tokio::test]
    async fn rejects_unknown_failed_and_unrelated_transactions() {
        let f = fixture().await;
        let p = product(&f.rows, 0, true).await;

        let missing = tx_hash_string(&B256::repeat_byte(9));
        let err = f.service.initiate(request(p.id, missing)).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation { code: "TX_NOT_FOUND", .. }));

        let reverted = B256::repeat_byte(8);
        f.chain.set_receipt(reverted, TxReceipt { success: false, logs: vec![] });
        let err = f
            .service
            .initiate(request(p.id, tx_hash_string(&reverted)))
            .await
            .unwrap_err();
        assert!(matches!(err, StorefrontError::Validation { code: "TX_FAILED", .. }));

        let elsewhere = B256::repeat_byte(7);
        f.chain.set_receipt(
            elsewhere,
            TxReceipt {
                success: true,
                logs: vec![ReceiptLog::transfer(token(), buyer(), buyer(), U256::from(1000u64))],
            },
        );
        let err = f
            .service
            .initiate(request(p.id, tx_hash_string(&elsewhere)))
            .await
            .unwrap_err();
        assert!(matches!(err, StorefrontError::Validation { code: "PAYMENT_NOT_FOUND", .. }));
        assert_eq!(f.rows.purchase_count().await, 0);
    }

    #[tokio::test]
    async fn transaction_cannot_buy_two_products() {
        let f = fixture().await;
        let a = product(&f.rows, 0, true).await;
        let b = product(&f.rows, 0, true).await;
        let tx = paid(&f.chain, 1, 1000);
        f.service.initiate(request(a.id, tx.clone())).await.unwrap();
        let err = f.service.initiate(request(b.id, tx)).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Conflict { code: "TX_ALREADY_USED", .. }));
    }

    #[tokio::test]
    async fn tokens_redeem_once() {
        let f = fixture().await;
        let p = product(&f.rows, 0, true).await;
        let tx = paid(&f.chain, 1, 1000);
        let receipt = f.service.initiate(request(p.id, tx)).await.unwrap();
        assert!(receipt.remaining_stock.is_none());

        let redemption = f.service.redeem(&receipt.token).await.unwrap();
        assert!(redemption.url.contains("private-downloads/pack.zip"));
        let err = f.service.redeem(&receipt.token).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Conflict { code: "TOKEN_ALREADY_USED", .. }));
        assert!(matches!(
            f.service.redeem("nope").await,
            Err(StorefrontError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn direct_flow_returns_url_and_spends_its_token() {
        let f = fixture().await;
        let p = product(&f.rows, 2, false).await;
        let tx = paid(&f.chain, 1, 1000);
        let direct = f.service.initiate_direct(request(p.id, tx.clone())).await.unwrap();
        assert!(direct.download_url.contains("pack.zip"));
        assert_eq!(direct.remaining_stock, Some(1));

        let purchase = f.rows.find_purchase_by_tx(&tx).await.unwrap().unwrap();
        let tokens = f.rows.list_tokens_for_purchases(&[purchase.id]).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].consumed);
    }

    #[tokio::test]
    async fn inactive_or_foreign_products_are_not_found() {
        let f = fixture().await;
        let p = product(&f.rows, 3, false).await;
        let tx = paid(&f.chain, 1, 1000);
        let mut foreign = request(p.id, tx.clone());
        foreign.tenant_id = Some("t2".to_string());
        assert!(matches!(
            f.service.initiate(foreign).await,
            Err(StorefrontError::NotFound(_))
        ));

        f.rows.set_product_active(p.id, "t1", false, None).await.unwrap();
        assert!(matches!(
            f.service.initiate(request(p.id, tx)).await,
            Err(StorefrontError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_the_payer_can_record_a_transaction() {
        let f = fixture().await;
        let p = product(&f.rows, 2, false).await;
        let tx = paid(&f.chain, 1, 1000);

        let mut stranger = request(p.id, tx.clone());
        stranger.buyer_address = format!("{:#x}", Address::repeat_byte(0xaa));
        let err = f.service.initiate(stranger.clone()).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation { code: "PAYER_MISMATCH", .. }));
        assert_eq!(f.rows.purchase_count().await, 0);
        assert_eq!(f.rows.get_product(p.id).await.unwrap().unwrap().stock, 2);

        // Once recorded, replays from another wallet still get nothing.
        f.service.initiate(request(p.id, tx)).await.unwrap();
        let err = f.service.initiate(stranger).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation { code: "PAYER_MISMATCH", .. }));
        let purchases = f.rows.list_purchases_by_buyer(&address_string(&buyer())).await.unwrap();
        assert_eq!(purchases.len(), 1);
        let tokens = f.rows.list_tokens_for_purchases(&[purchases[0].id]).await.unwrap();
        assert_eq!(tokens.len(), 1);
    }

    #[tokio::test]
    async fn failed_insert_returns_the_reserved_unit() {
        let f = fixture().await;
        let p = product(&f.rows, 2, false).await;
        let tx = paid(&f.chain, 1, 1000);

        f.rows.fail_purchase_inserts(true);
        let err = f.service.initiate(request(p.id, tx.clone())).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Upstream { context: "row store", .. }));
        assert_eq!(f.rows.get_product(p.id).await.unwrap().unwrap().stock, 2);
        assert_eq!(f.rows.purchase_count().await, 0);

        f.rows.fail_purchase_inserts(false);
        let receipt = f.service.initiate(request(p.id, tx)).await.unwrap();
        assert_eq!(receipt.remaining_stock, Some(1));
    }

    #[tokio::test]
    async fn losing_an_insert_race_reuses_the_winning_row() {
        let f = fixture().await;
        let p = product(&f.rows, 3, false).await;
        let tx = paid(&f.chain, 1, 1000);
        let winner = f
            .rows
            .insert_purchase(NewPurchase {
                product_id: p.id,
                buyer_address: address_string(&buyer()),
                tx_hash: tx.clone(),
                amount_paid: "1000".to_string(),
            })
            .await
            .unwrap();

        let late = NewPurchase {
            product_id: p.id,
            buyer_address: address_string(&buyer()),
            tx_hash: tx,
            amount_paid: "1000".to_string(),
        };
        let (purchase, already_recorded, remaining) =
            f.service.reserve_and_insert(&p, late).await.unwrap();
        assert_eq!(purchase.id, winner.id);
        assert!(already_recorded);
        assert_eq!(remaining, Some(3));
        assert_eq!(f.rows.get_product(p.id).await.unwrap().unwrap().stock, 3);
        assert_eq!(f.rows.purchase_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_for_one_transaction_record_once() {
        let f = fixture().await;
        let p = product(&f.rows, 10, false).await;
        let tx = paid(&f.chain, 1, 1000);
        let rows = f.rows.clone();
        let service = Arc::new(f.service);

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = service.clone();
                let req = request(p.id, tx.clone());
                tokio::spawn(async move { service.initiate(req).await })
            })
            .collect();
        let mut fresh = 0;
        let mut purchase_ids = Vec::new();
        for handle in handles {
            let receipt = handle.await.unwrap().unwrap();
            if !receipt.already_recorded {
                fresh += 1;
            }
            purchase_ids.push(receipt.purchase_id);
        }
        purchase_ids.dedup();
        assert_eq!(fresh, 1);
        assert_eq!(purchase_ids.len(), 1);
        assert_eq!(rows.purchase_count().await, 1);
        assert_eq!(rows.get_product(p.id).await.unwrap().unwrap().stock, 9);
    }
}
