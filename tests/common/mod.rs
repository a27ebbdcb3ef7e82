//! Spawns the real router on an ephemeral port over in-memory collaborators.

#![allow(dead_code)]

use alloy::primitives::{Address, B256, U256};
use serde_json::{json, Value};
use std::sync::Arc;
use web3_storefront::infra::chain::{ReceiptLog, StaticChainRpc, TxReceipt};
use web3_storefront::infra::StorefrontConfig;
use web3_storefront::storage::blobs::MemoryBlobStore;
use web3_storefront::storage::rows::MemoryRowStore;
use web3_storefront::transport;

pub const TENANT: &str = "tenant-a";

pub fn payment_token() -> Address {
    Address::repeat_byte(0x70)
}

pub fn merchant() -> Address {
    Address::repeat_byte(0x4d)
}

pub fn buyer() -> Address {
    Address::repeat_byte(0xb0)
}

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub rows: Arc<MemoryRowStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub chain: Arc<StaticChainRpc>,
}

pub async fn spawn() -> TestServer {
    let mut config = StorefrontConfig::for_tests();
    config.payment_token_address = Some(payment_token());
    config.merchant_address = Some(merchant());

    let rows = Arc::new(MemoryRowStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let chain = Arc::new(StaticChainRpc::new());
    let state = transport::http::AppState::new(
        Arc::new(config),
        rows.clone(),
        blobs.clone(),
        chain.clone(),
    );
    let router = transport::http::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap();
    TestServer {
        base_url: format!("http://{}", addr),
        client,
        rows,
        blobs,
        chain,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Creates a product for `TENANT` and returns its JSON.
    pub async fn create_product(&self, price: &str, stock: Option<i64>) -> Value {
        let mut body = json!({
            "name": "Sample pack",
            "description": "Forty drum loops",
            "content_path": "pack.zip",
            "price_token": "USDC",
            "price_amount": price,
        });
        match stock {
            Some(s) => body["stock"] = json!(s),
            None => body["unlimited"] = json!(true),
        }
        let resp = self
            .client
            .post(self.url("/api/products"))
            .header("x-tenant-id", TENANT)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    /// Registers a successful receipt paying `amount` to the merchant; returns the tx hash.
    pub fn paid_tx(&self, n: u8, amount: u64) -> String {
        let hash = B256::repeat_byte(n);
        self.chain.set_receipt(
            hash,
            TxReceipt {
                success: true,
                logs: vec![ReceiptLog::transfer(
                    payment_token(),
                    buyer(),
                    merchant(),
                    U256::from(amount),
                )],
            },
        );
        format!("{:#x}", hash)
    }

    pub async fn purchase(&self, path: &str, product_id: &str, tx_hash: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&json!({
                "product_id": product_id,
                "tx_hash": tx_hash,
                "buyer_address": format!("{:#x}", buyer()),
            }))
            .send()
            .await
            .unwrap()
    }
}

pub fn code(body: &Value) -> &str {
    body["data"]["code"].as_str().unwrap_or_default()
}
