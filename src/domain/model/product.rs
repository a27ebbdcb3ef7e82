use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A digital good offered by one tenant.
///
/// `price_amount` is kept as the decimal string the seller entered (wei-denominated);
/// it is only ever compared after parsing into a 256-bit integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub description: String,
    /// Object key inside the private downloads bucket.
    pub content_path: String,
    /// Public URL of the thumbnail, if one was uploaded.
    pub image_url: Option<String>,
    pub price_token: String,
    pub price_amount: String,
    /// Ignored when `unlimited` is set.
    pub stock: i64,
    pub unlimited: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    /// Optimistic-lock version for admin writes.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_sold_out(&self) -> bool {
        !self.unlimited && self.stock <= 0
    }

    /// Remaining stock as reported to buyers (`None` when unlimited).
    pub fn remaining_stock(&self) -> Option<i64> {
        if self.unlimited {
            None
        } else {
            Some(self.stock)
        }
    }
}

/// Validated field set for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub tenant_id: String,
    pub name: String,
    pub description: String,
    pub content_path: String,
    pub image_url: Option<String>,
    pub price_token: String,
    pub price_amount: String,
    pub stock: i64,
    pub unlimited: bool,
    pub active: bool,
}

/// Validated field set for an admin update. Every editable column is rewritten.
#[derive(Debug, Clone)]
pub struct ProductChanges {
    pub name: String,
    pub description: String,
    pub content_path: String,
    pub image_url: Option<String>,
    pub price_token: String,
    pub price_amount: String,
    pub stock: i64,
    pub unlimited: bool,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64, unlimited: bool) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            tenant_id: "t1".to_string(),
            name: "Track".to_string(),
            description: String::new(),
            content_path: "a.zip".to_string(),
            image_url: None,
            price_token: "USDC".to_string(),
            price_amount: "1".to_string(),
            stock,
            unlimited,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unlimited_products_never_sell_out() {
        let p = product(0, true);
        assert!(!p.is_sold_out());
        assert_eq!(p.remaining_stock(), None);
    }

    #[test]
    fn finite_stock_at_zero_is_sold_out() {
        assert!(product(0, false).is_sold_out());
        assert_eq!(product(3, false).remaining_stock(), Some(3));
    }
}
