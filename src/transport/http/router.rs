use crate::app::files::UPLOAD_BODY_LIMIT;
use crate::app::{
    ClaimEntry, ClaimHistoryResponse, ClaimRequest, DeletionReport, DirectDownload, ProductInput,
    ProductSummary, PurchaseReceipt, PurchaseRequest, StoredFile,
};
use crate::domain::model::{Bucket, ClaimStatus, Product, Purchase};
use crate::transport::http::handlers::{claims, download, files, health, products, purchases};
use crate::transport::http::types::{ApiResponse, AppState, DeleteFileRequest, UploadFileRequest};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        products::list_products_handler,
        products::get_product_handler,
        products::upsert_product_handler,
        products::delete_product_handler,
        files::upload_file_handler,
        files::delete_file_handler,
        purchases::create_purchase_handler,
        purchases::create_direct_purchase_handler,
        download::download_handler,
        claims::claims_handler
    ),
    components(schemas(
        ApiResponse,
        Product,
        ProductInput,
        DeletionReport,
        Bucket,
        UploadFileRequest,
        DeleteFileRequest,
        StoredFile,
        Purchase,
        PurchaseRequest,
        PurchaseReceipt,
        DirectDownload,
        ClaimRequest,
        ClaimStatus,
        ClaimEntry,
        ProductSummary,
        ClaimHistoryResponse
    ))
)]
pub struct ApiDoc;

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}

/// Turns a handler panic into a 500 envelope. The panic text is withheld in production.
fn panic_response(panic: Box<dyn Any + Send + 'static>, production: bool) -> Response {
    let message = panic_message(panic.as_ref());
    tracing::error!(panic = %message, "handler panicked");
    let data = if production {
        serde_json::json!({ "code": "INTERNAL_ERROR" })
    } else {
        serde_json::json!({ "code": "INTERNAL_ERROR", "detail": message })
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::failure(Some(data), "internal server error")),
    )
        .into_response()
}

pub fn create_router(app_state: AppState) -> Router {
    let production = app_state.config.production;
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route(
            "/api/products",
            get(products::list_products_handler).post(products::upsert_product_handler),
        )
        .route(
            "/api/products/:id",
            get(products::get_product_handler).delete(products::delete_product_handler),
        )
        .route(
            "/api/files",
            post(files::upload_file_handler)
                .delete(files::delete_file_handler)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/purchases", post(purchases::create_purchase_handler))
        .route(
            "/api/purchases/direct",
            post(purchases::create_direct_purchase_handler),
        )
        .route("/api/download/:token", get(download::download_handler))
        .route("/api/claims", post(claims::claims_handler))
        .with_state(app_state)
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            panic_response(panic, production)
        }))
        .layer(cors)
}
