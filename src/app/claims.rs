//! Buyer-facing claim history: every purchase made by a wallet with its current download status.

use crate::domain::model::{classify_claim, ClaimStatus, DownloadToken, Product, Purchase};
use crate::domain::money::{address_string, parse_address, parse_tx_hash};
use crate::domain::{clock, StorefrontError, StorefrontResult};
use crate::infra::chain::{verify_wallet_signature, ChainRpc};
use crate::infra::wallet::parse_claim_message;
use crate::storage::RowStore;
use alloy::primitives::Address;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ClaimRequest {
    pub wallet_address: String,
    /// Personal-sign message; must come together with `signature`.
    #[serde(default)]
    pub message: Option<String>,
    /// 65-byte hex signature of `message` by `wallet_address`.
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub price_token: String,
    pub price_amount: String,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            image_url: p.image_url.clone(),
            price_token: p.price_token.clone(),
            price_amount: p.price_amount.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClaimEntry {
    pub purchase: Purchase,
    /// `None` if the product row is gone.
    pub product: Option<ProductSummary>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub status: ClaimStatus,
    /// Result of the read-time receipt re-check; `None` when the chain could not be asked.
    pub chain_verified: Option<bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClaimHistoryResponse {
    pub wallet_address: String,
    pub claims: Vec<ClaimEntry>,
}

/// How long a signed claim message stays acceptable.
pub fn claim_message_ttl() -> Duration {
    Duration::minutes(10)
}

/// The signed text must be a claim message for `wallet`, issued within the last
/// [`claim_message_ttl`] (one minute of clock skew tolerated).
fn check_claim_message(wallet: &Address, message: &str, now: DateTime<Utc>) -> StorefrontResult<()> {
    let (named, issued) = parse_claim_message(message)
        .ok_or_else(|| StorefrontError::Unauthorized("signed text is not a claim message".to_string()))?;
    if named != *wallet {
        return Err(StorefrontError::Unauthorized(
            "claim message names a different wallet".to_string(),
        ));
    }
    if issued > now + Duration::minutes(1) || now - issued > claim_message_ttl() {
        return Err(StorefrontError::Unauthorized("claim message has expired".to_string()));
    }
    Ok(())
}

/// Newest token per purchase.
fn latest_tokens(tokens: Vec<DownloadToken>) -> HashMap<Uuid, DownloadToken> {
    let mut latest: HashMap<Uuid, DownloadToken> = HashMap::new();
    for token in tokens {
        match latest.get(&token.purchase_id) {
            Some(current) if current.created_at >= token.created_at => {}
            _ => {
                latest.insert(token.purchase_id, token);
            }
        }
    }
    latest
}

pub struct ClaimHistory {
    rows: Arc<dyn RowStore>,
    chain: Arc<dyn ChainRpc>,
}

impl ClaimHistory {
    pub fn new(rows: Arc<dyn RowStore>, chain: Arc<dyn ChainRpc>) -> Self {
        Self { rows, chain }
    }

    /// Read-only: the chain re-check shapes the response but never touches stored rows.
    pub async fn history(&self, request: ClaimRequest) -> StorefrontResult<ClaimHistoryResponse> {
        let address = parse_address(&request.wallet_address)
            .map_err(|e| StorefrontError::validation_code("INVALID_ADDRESS", e))?;
        match (request.message.as_deref(), request.signature.as_deref()) {
            (None, None) => {}
            (Some(message), Some(signature)) => {
                verify_wallet_signature(&address, message, signature).map_err(|e| {
                    tracing::warn!(wallet = %address, error = %e, "claim signature rejected");
                    StorefrontError::Unauthorized(format!("signature does not match wallet: {}", e))
                })?;
                check_claim_message(&address, message, clock::now())?;
            }
            _ => {
                return Err(StorefrontError::validation(
                    "message and signature must be supplied together",
                ))
            }
        }

        let wallet = address_string(&address);
        let purchases = self.rows.list_purchases_by_buyer(&wallet).await?;
        if purchases.is_empty() {
            return Ok(ClaimHistoryResponse {
                wallet_address: wallet,
                claims: Vec::new(),
            });
        }

        let mut product_ids: Vec<Uuid> = purchases.iter().map(|p| p.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        let purchase_ids: Vec<Uuid> = purchases.iter().map(|p| p.id).collect();

        let products: HashMap<Uuid, Product> = self
            .rows
            .get_products(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let tokens = latest_tokens(self.rows.list_tokens_for_purchases(&purchase_ids).await?);
        let checks = join_all(purchases.iter().map(|p| self.recheck(p))).await;

        let now = clock::now();
        let claims = purchases
            .into_iter()
            .zip(checks)
            .map(|(purchase, chain_verified)| {
                let token = tokens.get(&purchase.id);
                ClaimEntry {
                    product: products.get(&purchase.product_id).map(ProductSummary::from),
                    token_expires_at: token.map(|t| t.expires_at),
                    status: classify_claim(token, chain_verified, now),
                    chain_verified,
                    purchase,
                }
            })
            .collect();

        Ok(ClaimHistoryResponse {
            wallet_address: wallet,
            claims,
        })
    }

    /// `Some(success)` from the receipt, `Some(false)` if the chain no longer knows the
    /// transaction, `None` if it could not be asked.
    async fn recheck(&self, purchase: &Purchase) -> Option<bool> {
        let hash = match parse_tx_hash(&purchase.tx_hash) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(purchase = %purchase.id, error = %e, "stored tx hash is unparseable");
                return None;
            }
        };
        match self.chain.transaction_receipt(hash).await {
            Ok(receipt) => Some(receipt.is_some_and(|r| r.success)),
            Err(e) => {
                tracing::warn!(purchase = %purchase.id, error = %e, "receipt re-check failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{NewProduct, NewPurchase};
    use crate::domain::money::tx_hash_string;
    use crate::infra::chain::{StaticChainRpc, TxReceipt};
    use crate::infra::wallet::claim_message;
    use crate::storage::rows::MemoryRowStore;
    use alloy::primitives::B256;
    use alloy::signers::local::PrivateKeySigner;
    use alloy::signers::Signer;
    use chrono::Duration;

    struct Fixture {
        history: ClaimHistory,
        rows: Arc<MemoryRowStore>,
        chain: Arc<StaticChainRpc>,
        product: Product,
    }

    async fn fixture() -> Fixture {
        let rows = Arc::new(MemoryRowStore::new());
        let chain = Arc::new(StaticChainRpc::new());
        let product = rows
            .insert_product(NewProduct {
                tenant_id: "t1".to_string(),
                name: "Pack".to_string(),
                description: String::new(),
                content_path: "pack.zip".to_string(),
                image_url: Some("http://img".to_string()),
                price_token: "USDC".to_string(),
                price_amount: "10".to_string(),
                stock: 0,
                unlimited: true,
                active: true,
            })
            .await
            .unwrap();
        Fixture {
            history: ClaimHistory::new(rows.clone(), chain.clone()),
            rows,
            chain,
            product,
        }
    }

    async fn buy(f: &Fixture, buyer: &str, n: u8, ok_on_chain: bool) -> Purchase {
        let hash = B256::repeat_byte(n);
        f.chain.set_receipt(hash, TxReceipt { success: ok_on_chain, logs: vec![] });
        f.rows
            .insert_purchase(NewPurchase {
                product_id: f.product.id,
                buyer_address: buyer.to_string(),
                tx_hash: tx_hash_string(&hash),
                amount_paid: "10".to_string(),
            })
            .await
            .unwrap()
    }

    fn request(wallet: &str) -> ClaimRequest {
        ClaimRequest {
            wallet_address: wallet.to_string(),
            message: None,
            signature: None,
        }
    }

    const WALLET: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

    #[tokio::test]
    async fn classifies_every_status() {
        let f = fixture().await;
        let pending = buy(&f, WALLET, 1, true).await;
        let available = buy(&f, WALLET, 2, true).await;
        let completed = buy(&f, WALLET, 3, true).await;
        let expired = buy(&f, WALLET, 4, true).await;
        let failed = buy(&f, WALLET, 5, false).await;

        for p in [&available, &completed, &failed] {
            f.rows
                .create_download_token(p.id, f.product.id, Duration::hours(1))
                .await
                .unwrap();
        }
        let used = f.rows.list_tokens_for_purchases(&[completed.id]).await.unwrap();
        f.rows.consume_download_token(&used[0].token).await.unwrap().unwrap();
        f.rows
            .create_download_token(expired.id, f.product.id, Duration::seconds(-5))
            .await
            .unwrap();

        let response = f.history.history(request(WALLET)).await.unwrap();
        let status: HashMap<Uuid, ClaimStatus> = response
            .claims
            .iter()
            .map(|c| (c.purchase.id, c.status))
            .collect();
        assert_eq!(status[&pending.id], ClaimStatus::Pending);
        assert_eq!(status[&available.id], ClaimStatus::Available);
        assert_eq!(status[&completed.id], ClaimStatus::Completed);
        assert_eq!(status[&expired.id], ClaimStatus::Expired);
        assert_eq!(status[&failed.id], ClaimStatus::Failed);
        assert!(response
            .claims
            .iter()
            .all(|c| c.product.as_ref().map(|p| p.name.as_str()) == Some("Pack")));
        assert_eq!(response.claims.iter().filter(|c| c.token_expires_at.is_none()).count(), 1);
    }

    #[tokio::test]
    async fn rpc_errors_fall_back_to_token_status() {
        let f = fixture().await;
        let p = buy(&f, WALLET, 1, true).await;
        f.rows
            .create_download_token(p.id, f.product.id, Duration::hours(1))
            .await
            .unwrap();
        f.chain.set_error(B256::repeat_byte(1), "rate limited");

        let response = f.history.history(request(WALLET)).await.unwrap();
        assert_eq!(response.claims[0].status, ClaimStatus::Available);
        assert_eq!(response.claims[0].chain_verified, None);
    }

    #[tokio::test]
    async fn signatures_must_match_the_wallet() {
        let f = fixture().await;
        let signer = PrivateKeySigner::random();
        let wallet = format!("{:#x}", signer.address());
        buy(&f, &wallet, 1, true).await;
        let message = claim_message(&signer.address(), Utc::now());
        let signature = signer.sign_message(message.as_bytes()).await.unwrap();
        let sig_hex = format!("0x{}", hex::encode(signature.as_bytes()));

        let signed = ClaimRequest {
            wallet_address: wallet.clone(),
            message: Some(message.clone()),
            signature: Some(sig_hex.clone()),
        };
        assert_eq!(f.history.history(signed).await.unwrap().claims.len(), 1);

        let forged = ClaimRequest {
            wallet_address: WALLET.to_string(),
            message: Some(message.clone()),
            signature: Some(sig_hex),
        };
        assert!(matches!(
            f.history.history(forged).await,
            Err(StorefrontError::Unauthorized(_))
        ));

        let half = ClaimRequest {
            wallet_address: wallet,
            message: Some(message),
            signature: None,
        };
        assert!(matches!(
            f.history.history(half).await,
            Err(StorefrontError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn stale_or_foreign_claim_messages_are_refused() {
        let f = fixture().await;
        let signer = PrivateKeySigner::random();
        let wallet = format!("{:#x}", signer.address());
        let signed = |message: String| {
            let signer = signer.clone();
            let wallet = wallet.clone();
            async move {
                let signature = signer.sign_message(message.as_bytes()).await.unwrap();
                ClaimRequest {
                    wallet_address: wallet,
                    message: Some(message),
                    signature: Some(format!("0x{}", hex::encode(signature.as_bytes()))),
                }
            }
        };

        let old = claim_message(&signer.address(), Utc::now() - Duration::hours(2));
        let other = claim_message(&WALLET.parse::<Address>().unwrap(), Utc::now());
        for message in [old, other, "hello".to_string()] {
            assert!(matches!(
                f.history.history(signed(message).await).await,
                Err(StorefrontError::Unauthorized(_))
            ));
        }
        let fresh = claim_message(&signer.address(), Utc::now());
        assert!(f.history.history(signed(fresh).await).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_wallet_has_empty_history() {
        let f = fixture().await;
        let response = f.history.history(request(WALLET)).await.unwrap();
        assert!(response.claims.is_empty());
        assert_eq!(f.chain.calls(), 0);
    }
}
