use crate::transport::http::types::{ApiResponse, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy (row store reachable)", body = ApiResponse),
        (status = 503, description = "Service is unhealthy (row store unreachable)", body = ApiResponse)
    )
)]
pub async fn healthcheck_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.rows.backend_name();
    match state.rows.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!({ "status": "ok", "store": store }))),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(store, error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::failure(
                    Some(serde_json::json!({ "status": "unhealthy", "store": store })),
                    format!("row store ping failed: {}", e),
                )),
            )
                .into_response()
        }
    }
}
