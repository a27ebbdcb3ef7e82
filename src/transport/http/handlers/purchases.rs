use crate::app::PurchaseRequest;
use crate::transport::http::error::ApiResult;
use crate::transport::http::handlers::common::json_body;
use crate::transport::http::types::{ApiResponse, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

const EXPECTED_BODY: &str =
    "{\"product_id\": \"<uuid>\", \"tx_hash\": \"0x...\", \"buyer_address\": \"0x...\", \"tenant_id\"?, \"amount\"?}";

#[utoipa::path(
    post,
    path = "/api/purchases",
    request_body = PurchaseRequest,
    responses(
        (status = 200, description = "Download token issued (24h)", body = ApiResponse),
        (status = 400, description = "TX_NOT_FOUND, TX_FAILED, PAYMENT_NOT_FOUND, UNDERPAID or malformed input", body = ApiResponse),
        (status = 404, description = "Product missing or inactive", body = ApiResponse),
        (status = 409, description = "SOLD_OUT or TX_ALREADY_USED", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 502, description = "Store or chain RPC failure", body = ApiResponse)
    )
)]
pub async fn create_purchase_handler(
    State(state): State<AppState>,
    body: Result<Json<PurchaseRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let request = json_body(body, EXPECTED_BODY)?;
    let receipt = state.purchases.initiate(request).await?;
    Ok(Json(ApiResponse::ok(receipt)))
}

#[utoipa::path(
    post,
    path = "/api/purchases/direct",
    request_body = PurchaseRequest,
    responses(
        (status = 200, description = "Signed download URL (10 min)", body = ApiResponse),
        (status = 400, description = "TX_NOT_FOUND, TX_FAILED, PAYMENT_NOT_FOUND, UNDERPAID or malformed input", body = ApiResponse),
        (status = 404, description = "Product missing or inactive", body = ApiResponse),
        (status = 409, description = "SOLD_OUT or TX_ALREADY_USED", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 502, description = "Store, storage or chain RPC failure", body = ApiResponse)
    )
)]
pub async fn create_direct_purchase_handler(
    State(state): State<AppState>,
    body: Result<Json<PurchaseRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let request = json_body(body, EXPECTED_BODY)?;
    let download = state.purchases.initiate_direct(request).await?;
    Ok(Json(ApiResponse::ok(download)))
}
