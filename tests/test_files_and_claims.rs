//! File uploads and buyer claim history over HTTP.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{buyer, code, spawn};
use serde_json::{json, Value};
use web3_storefront::domain::model::Bucket;
use web3_storefront::infra::chain::TxReceipt;

#[tokio::test]
async fn uploads_land_in_the_requested_bucket() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn().await;
    let payload = format!("data:image/png;base64,{}", STANDARD.encode(b"thumbnail"));
    let resp = server
        .client
        .post(server.url("/api/files"))
        .json(&json!({ "file": payload, "bucket": "public-assets", "file_name": "Cover Art.PNG" }))
        .send()
        .await?;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await?;
    let path = body["data"]["path"].as_str().unwrap_or_default().to_string();
    assert!(path.ends_with("-cover-art.png"));
    assert!(body["data"]["public_url"].as_str().is_some());
    let stored = server.blobs.get(Bucket::PublicAssets, &path).await.unwrap();
    assert_eq!(stored.content_type, "image/png");

    let private: Value = server
        .client
        .post(server.url("/api/files"))
        .json(&json!({ "file": STANDARD.encode(b"zip"), "bucket": "private-downloads" }))
        .send()
        .await?
        .json()
        .await?;
    assert!(private["data"]["public_url"].is_null());
    Ok(())
}

#[tokio::test]
async fn upload_limits_and_validation() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn().await;
    let oversized = STANDARD.encode(vec![0u8; 25 * 1024 * 1024 + 1]);
    let resp = server
        .client
        .post(server.url("/api/files"))
        .json(&json!({ "file": oversized, "bucket": "temp" }))
        .send()
        .await?;
    assert_eq!(resp.status(), 413);

    let resp = server
        .client
        .post(server.url("/api/files"))
        .json(&json!({ "file": "", "bucket": "temp" }))
        .send()
        .await?;
    assert_eq!(resp.status(), 400);

    let resp = server
        .client
        .post(server.url("/api/files"))
        .json(&json!({ "file": STANDARD.encode(b"x"), "bucket": "secret" }))
        .send()
        .await?;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await?;
    assert_eq!(code(&body), "INVALID_BUCKET");
    assert_eq!(server.blobs.put_count(), 0);

    let traversal = server
        .client
        .delete(server.url("/api/files"))
        .json(&json!({ "path": "../other-tenant/pack.zip" }))
        .send()
        .await?;
    assert_eq!(traversal.status(), 400);
    Ok(())
}

#[tokio::test]
async fn claim_history_marks_reverted_purchases_failed() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn().await;
    let product = server.create_product("1000", None).await;
    let product_id = product["id"].as_str().unwrap_or_default();
    let kept = server.paid_tx(1, 1000);
    let reverted = server.paid_tx(2, 1000);
    assert_eq!(server.purchase("/api/purchases", product_id, &kept).await.status(), 200);
    assert_eq!(server.purchase("/api/purchases", product_id, &reverted).await.status(), 200);

    // The chain now reports the second transaction as failed.
    server.chain.set_receipt(
        alloy::primitives::B256::repeat_byte(2),
        TxReceipt { success: false, logs: vec![] },
    );

    let body: Value = server
        .client
        .post(server.url("/api/claims"))
        .json(&json!({ "wallet_address": format!("{:#x}", buyer()) }))
        .send()
        .await?
        .json()
        .await?;
    let claims = body["data"]["claims"].as_array().cloned().unwrap_or_default();
    assert_eq!(claims.len(), 2);
    for claim in &claims {
        let tx = claim["purchase"]["tx_hash"].as_str().unwrap_or_default();
        if tx == reverted {
            assert_eq!(claim["status"], "failed");
            assert_eq!(claim["chain_verified"], false);
        } else {
            assert_eq!(claim["status"], "available");
            assert_eq!(claim["chain_verified"], true);
        }
        assert_eq!(claim["product"]["name"], "Sample pack");
    }
    Ok(())
}

#[tokio::test]
async fn claim_signature_must_match_wallet() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn().await;
    let resp = server
        .client
        .post(server.url("/api/claims"))
        .json(&json!({
            "wallet_address": format!("{:#x}", buyer()),
            "message": "Show purchase history",
            "signature": format!("0x{}", "11".repeat(65)),
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), 401);

    let resp = server
        .client
        .post(server.url("/api/claims"))
        .json(&json!({ "wallet_address": "not-an-address" }))
        .send()
        .await?;
    assert_eq!(resp.status(), 400);
    Ok(())
}
