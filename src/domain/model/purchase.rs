use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One recorded on-chain payment. The transaction hash is the idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Purchase {
    pub id: Uuid,
    pub product_id: Uuid,
    pub buyer_address: String,
    pub tx_hash: String,
    /// Amount transferred on-chain, as a decimal string.
    pub amount_paid: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub product_id: Uuid,
    pub buyer_address: String,
    pub tx_hash: String,
    pub amount_paid: String,
}

/// Single-use, expiring entitlement to download a purchased product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DownloadToken {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub product_id: Uuid,
    pub token: String,
    pub consumed: bool,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DownloadToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Why a token could not be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    NotFound,
    Expired,
    AlreadyUsed,
}

/// Opaque token string: 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}
