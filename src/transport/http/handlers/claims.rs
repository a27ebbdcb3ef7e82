use crate::app::ClaimRequest;
use crate::transport::http::error::ApiResult;
use crate::transport::http::handlers::common::json_body;
use crate::transport::http::types::{ApiResponse, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

#[utoipa::path(
    post,
    path = "/api/claims",
    request_body = ClaimRequest,
    responses(
        (status = 200, description = "Purchases of the wallet with their download status", body = ApiResponse),
        (status = 400, description = "Malformed address, or message without signature", body = ApiResponse),
        (status = 401, description = "Signature does not belong to the wallet", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn claims_handler(
    State(state): State<AppState>,
    body: Result<Json<ClaimRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let request = json_body(
        body,
        "{\"wallet_address\": \"0x...\", \"message\"?, \"signature\"?}",
    )?;
    let history = state.claims.history(request).await?;
    Ok(Json(ApiResponse::ok(history)))
}
