//! Postgres row store.
//!
//! Tables are created idempotently by `ensure_schema` at startup. The two concurrency-sensitive routines are single
//! conditional statements, so Postgres row locking serializes competing callers:
//! - stock: `UPDATE ... SET stock = stock - 1 WHERE stock > 0 RETURNING stock`
//! - tokens: `UPDATE ... SET consumed = true WHERE consumed = false AND expires_at > now()`
//!
//! When no URL is configured the store still constructs; every call then fails with an
//! `Unexpected` error so misconfiguration shows up on first use.

use super::{RowStore, StoreError, StoreResult};
use crate::domain::model::{
    generate_token, DownloadToken, NewProduct, NewPurchase, Product, ProductChanges, Purchase,
    TokenRejection,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

const PRODUCT_COLUMNS: &str = "id, tenant_id, name, description, content_path, image_url, \
     price_token, price_amount, stock, unlimited, active, created_at, updated_at";
const PURCHASE_COLUMNS: &str = "id, product_id, buyer_address, tx_hash, amount_paid, created_at";
const TOKEN_COLUMNS: &str =
    "id, purchase_id, product_id, token, consumed, expires_at, consumed_at, created_at";

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        content_path TEXT NOT NULL,
        image_url TEXT,
        price_token TEXT NOT NULL,
        price_amount TEXT NOT NULL,
        stock BIGINT NOT NULL DEFAULT 0 CHECK (stock >= 0),
        unlimited BOOLEAN NOT NULL DEFAULT false,
        active BOOLEAN NOT NULL DEFAULT true,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS products_tenant_created_idx ON products (tenant_id, created_at DESC)",
    "CREATE TABLE IF NOT EXISTS purchases (
        id UUID PRIMARY KEY,
        product_id UUID NOT NULL REFERENCES products(id),
        buyer_address TEXT NOT NULL,
        tx_hash TEXT NOT NULL UNIQUE,
        amount_paid TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS purchases_buyer_idx ON purchases (buyer_address, created_at DESC)",
    "CREATE TABLE IF NOT EXISTS download_tokens (
        id UUID PRIMARY KEY,
        purchase_id UUID NOT NULL REFERENCES purchases(id),
        product_id UUID NOT NULL REFERENCES products(id),
        token TEXT NOT NULL UNIQUE,
        consumed BOOLEAN NOT NULL DEFAULT false,
        expires_at TIMESTAMPTZ NOT NULL,
        consumed_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS download_tokens_purchase_idx ON download_tokens (purchase_id)",
];

pub struct PgRowStore {
    pool: Option<PgPool>,
}

impl PgRowStore {
    /// Builds a lazily connecting pool; nothing touches the network until the first query.
    pub fn connect_lazy(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;
        Ok(Self { pool: Some(pool) })
    }

    /// A store whose every call fails; used when `DATABASE_URL` is missing.
    pub fn unconfigured() -> Self {
        Self { pool: None }
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let pool = self.pool()?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await.map_err(db_err)?;
        }
        Ok(())
    }

    fn pool(&self) -> StoreResult<&PgPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| {
                StoreError::Unexpected(anyhow::anyhow!(
                    "row store is not configured (DATABASE_URL missing)"
                ))
            })
    }

    async fn product_exists(&self, id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool()?)
            .await
            .map_err(db_err)?;
        Ok(exists)
    }

    /// After a conditional update matched nothing: the row is either gone or its version moved.
    async fn missing_or_stale(&self, id: Uuid, tenant_id: &str) -> StoreError {
        let pool = match self.pool() {
            Ok(p) => p,
            Err(e) => return e,
        };
        let row = sqlx::query("SELECT updated_at FROM products WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await;
        match row {
            Ok(Some(r)) => {
                let current: DateTime<Utc> = r.try_get("updated_at").unwrap_or_default();
                StoreError::Conflict(format!(
                    "product {} was modified at {}",
                    id,
                    current.to_rfc3339()
                ))
            }
            Ok(None) => StoreError::NotFound(format!("product {}", id)),
            Err(e) => db_err(e),
        }
    }
}

/// A foreign-key violation means a missing parent on insert and live children on delete.
fn constraint_error(code: &str, message: &str, deleting: bool) -> Option<StoreError> {
    match code {
        UNIQUE_VIOLATION => Some(StoreError::Conflict(message.to_string())),
        FOREIGN_KEY_VIOLATION if deleting => Some(StoreError::Conflict(message.to_string())),
        FOREIGN_KEY_VIOLATION => Some(StoreError::NotFound(message.to_string())),
        _ => None,
    }
}

fn map_db_err(err: sqlx::Error, deleting: bool) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if let Some(mapped) = db
            .code()
            .and_then(|code| constraint_error(&code, db.message(), deleting))
        {
            return mapped;
        }
    }
    StoreError::Unexpected(anyhow::Error::new(err))
}

fn db_err(err: sqlx::Error) -> StoreError {
    map_db_err(err, false)
}

fn delete_err(err: sqlx::Error) -> StoreError {
    map_db_err(err, true)
}

fn product_from_row(row: &PgRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        content_path: row.try_get("content_path")?,
        image_url: row.try_get("image_url")?,
        price_token: row.try_get("price_token")?,
        price_amount: row.try_get("price_amount")?,
        stock: row.try_get("stock")?,
        unlimited: row.try_get("unlimited")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn purchase_from_row(row: &PgRow) -> Result<Purchase, sqlx::Error> {
    Ok(Purchase {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        buyer_address: row.try_get("buyer_address")?,
        tx_hash: row.try_get("tx_hash")?,
        amount_paid: row.try_get("amount_paid")?,
        created_at: row.try_get("created_at")?,
    })
}

fn token_from_row(row: &PgRow) -> Result<DownloadToken, sqlx::Error> {
    Ok(DownloadToken {
        id: row.try_get("id")?,
        purchase_id: row.try_get("purchase_id")?,
        product_id: row.try_get("product_id")?,
        token: row.try_get("token")?,
        consumed: row.try_get("consumed")?,
        expires_at: row.try_get("expires_at")?,
        consumed_at: row.try_get("consumed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl RowStore for PgRowStore {
    async fn list_products(
        &self,
        tenant_id: &str,
        active: Option<bool>,
    ) -> StoreResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE tenant_id = $1 AND ($2::boolean IS NULL OR active = $2) \
             ORDER BY created_at DESC",
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(active)
            .fetch_all(self.pool()?)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(product_from_row)
            .collect::<Result<_, _>>()
            .map_err(db_err)
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool()?)
            .await
            .map_err(db_err)?;
        row.as_ref().map(product_from_row).transpose().map_err(db_err)
    }

    async fn get_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {} FROM products WHERE id = ANY($1)", PRODUCT_COLUMNS);
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(self.pool()?)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(product_from_row)
            .collect::<Result<_, _>>()
            .map_err(db_err)
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let sql = format!(
            "INSERT INTO products (id, tenant_id, name, description, content_path, image_url, \
             price_token, price_amount, stock, unlimited, active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now(), now()) RETURNING {}",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&product.tenant_id)
            .bind(&product.name)
            .bind(&product.description)
            .bind(&product.content_path)
            .bind(&product.image_url)
            .bind(&product.price_token)
            .bind(&product.price_amount)
            .bind(product.stock)
            .bind(product.unlimited)
            .bind(product.active)
            .fetch_one(self.pool()?)
            .await
            .map_err(db_err)?;
        product_from_row(&row).map_err(db_err)
    }

    async fn update_product(
        &self,
        id: Uuid,
        tenant_id: &str,
        expected_updated_at: DateTime<Utc>,
        changes: ProductChanges,
    ) -> StoreResult<Product> {
        let sql = format!(
            "UPDATE products SET name = $4, description = $5, content_path = $6, image_url = $7, \
             price_token = $8, price_amount = $9, stock = $10, unlimited = $11, active = $12, \
             updated_at = GREATEST(now(), updated_at + interval '1 microsecond') \
             WHERE id = $1 AND tenant_id = $2 AND updated_at = $3 RETURNING {}",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(tenant_id)
            .bind(expected_updated_at)
            .bind(&changes.name)
            .bind(&changes.description)
            .bind(&changes.content_path)
            .bind(&changes.image_url)
            .bind(&changes.price_token)
            .bind(&changes.price_amount)
            .bind(changes.stock)
            .bind(changes.unlimited)
            .bind(changes.active)
            .fetch_optional(self.pool()?)
            .await
            .map_err(db_err)?;
        match row {
            Some(r) => product_from_row(&r).map_err(db_err),
            None => Err(self.missing_or_stale(id, tenant_id).await),
        }
    }

    async fn set_product_active(
        &self,
        id: Uuid,
        tenant_id: &str,
        active: bool,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Product> {
        let sql = format!(
            "UPDATE products SET active = $3, \
             updated_at = GREATEST(now(), updated_at + interval '1 microsecond') \
             WHERE id = $1 AND tenant_id = $2 \
             AND ($4::timestamptz IS NULL OR updated_at = $4) RETURNING {}",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(tenant_id)
            .bind(active)
            .bind(expected_updated_at)
            .fetch_optional(self.pool()?)
            .await
            .map_err(db_err)?;
        match row {
            Some(r) => product_from_row(&r).map_err(db_err),
            None => Err(self.missing_or_stale(id, tenant_id).await),
        }
    }

    async fn delete_product(&self, id: Uuid, tenant_id: &str) -> StoreResult<Product> {
        let sql = format!(
            "DELETE FROM products WHERE id = $1 AND tenant_id = $2 RETURNING {}",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool()?)
            .await
            .map_err(delete_err)?;
        match row {
            Some(r) => product_from_row(&r).map_err(db_err),
            None => Err(StoreError::NotFound(format!("product {}", id))),
        }
    }

    async fn decrement_stock(&self, product_id: Uuid) -> StoreResult<i64> {
        let remaining: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET stock = stock - 1 \
             WHERE id = $1 AND unlimited = false AND stock > 0 RETURNING stock",
        )
        .bind(product_id)
        .fetch_optional(self.pool()?)
        .await
        .map_err(db_err)?;
        match remaining {
            Some(stock) => Ok(stock),
            None if self.product_exists(product_id).await? => Err(StoreError::Exhausted),
            None => Err(StoreError::NotFound(format!("product {}", product_id))),
        }
    }

    async fn increment_stock(&self, product_id: Uuid) -> StoreResult<i64> {
        let remaining: Option<i64> =
            sqlx::query_scalar("UPDATE products SET stock = stock + 1 WHERE id = $1 RETURNING stock")
                .bind(product_id)
                .fetch_optional(self.pool()?)
                .await
                .map_err(db_err)?;
        remaining.ok_or_else(|| StoreError::NotFound(format!("product {}", product_id)))
    }

    async fn find_purchase_by_tx(&self, tx_hash: &str) -> StoreResult<Option<Purchase>> {
        let sql = format!("SELECT {} FROM purchases WHERE tx_hash = $1", PURCHASE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(tx_hash)
            .fetch_optional(self.pool()?)
            .await
            .map_err(db_err)?;
        row.as_ref().map(purchase_from_row).transpose().map_err(db_err)
    }

    async fn insert_purchase(&self, purchase: NewPurchase) -> StoreResult<Purchase> {
        let sql = format!(
            "INSERT INTO purchases (id, product_id, buyer_address, tx_hash, amount_paid, created_at) \
             VALUES ($1, $2, $3, $4, $5, now()) RETURNING {}",
            PURCHASE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(purchase.product_id)
            .bind(&purchase.buyer_address)
            .bind(&purchase.tx_hash)
            .bind(&purchase.amount_paid)
            .fetch_one(self.pool()?)
            .await
            .map_err(db_err)?;
        purchase_from_row(&row).map_err(db_err)
    }

    async fn list_purchases_by_buyer(&self, buyer_address: &str) -> StoreResult<Vec<Purchase>> {
        let sql = format!(
            "SELECT {} FROM purchases WHERE buyer_address = $1 ORDER BY created_at DESC",
            PURCHASE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(buyer_address)
            .fetch_all(self.pool()?)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(purchase_from_row)
            .collect::<Result<_, _>>()
            .map_err(db_err)
    }

    async fn create_download_token(
        &self,
        purchase_id: Uuid,
        product_id: Uuid,
        ttl: Duration,
    ) -> StoreResult<DownloadToken> {
        let sql = format!(
            "INSERT INTO download_tokens (id, purchase_id, product_id, token, consumed, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, false, now() + make_interval(secs => $5), now()) RETURNING {}",
            TOKEN_COLUMNS
        );
        let ttl_secs = ttl.num_milliseconds() as f64 / 1000.0;
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(purchase_id)
            .bind(product_id)
            .bind(generate_token())
            .bind(ttl_secs)
            .fetch_one(self.pool()?)
            .await
            .map_err(db_err)?;
        token_from_row(&row).map_err(db_err)
    }

    async fn consume_download_token(
        &self,
        token: &str,
    ) -> StoreResult<Result<DownloadToken, TokenRejection>> {
        let sql = format!(
            "UPDATE download_tokens SET consumed = true, consumed_at = now() \
             WHERE token = $1 AND consumed = false AND expires_at > now() RETURNING {}",
            TOKEN_COLUMNS
        );
        let pool = self.pool()?;
        let row = sqlx::query(&sql)
            .bind(token)
            .fetch_optional(pool)
            .await
            .map_err(db_err)?;
        if let Some(r) = row {
            return token_from_row(&r).map(Ok).map_err(db_err);
        }

        // The update is the decision; this read only explains the rejection.
        let status = sqlx::query(
            "SELECT consumed, expires_at <= now() AS expired FROM download_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;
        let Some(status) = status else {
            return Ok(Err(TokenRejection::NotFound));
        };
        let expired: bool = status.try_get("expired").map_err(db_err)?;
        if expired {
            return Ok(Err(TokenRejection::Expired));
        }
        Ok(Err(TokenRejection::AlreadyUsed))
    }

    async fn list_tokens_for_purchases(
        &self,
        purchase_ids: &[Uuid],
    ) -> StoreResult<Vec<DownloadToken>> {
        if purchase_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM download_tokens WHERE purchase_id = ANY($1)",
            TOKEN_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(purchase_ids)
            .fetch_all(self.pool()?)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(token_from_row)
            .collect::<Result<_, _>>()
            .map_err(db_err)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(self.pool()?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_key_violations_depend_on_the_statement() {
        assert!(matches!(
            constraint_error(FOREIGN_KEY_VIOLATION, "no product", false),
            Some(StoreError::NotFound(_))
        ));
        assert!(matches!(
            constraint_error(FOREIGN_KEY_VIOLATION, "purchases remain", true),
            Some(StoreError::Conflict(_))
        ));
        assert!(matches!(
            constraint_error(UNIQUE_VIOLATION, "duplicate tx", false),
            Some(StoreError::Conflict(_))
        ));
        assert!(constraint_error("42P01", "undefined table", false).is_none());
    }

    #[tokio::test]
    async fn unconfigured_store_fails_on_first_use() {
        let store = PgRowStore::unconfigured();
        let err = store.health_check().await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
        assert!(matches!(
            store.get_product(Uuid::new_v4()).await,
            Err(StoreError::Unexpected(_))
        ));
    }
}
