use crate::transport::http::error::{ApiError, ApiResult};
use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Caller's tenant, taken from the `x-tenant-id` header. Required on every catalog mutation.
#[derive(Debug, Clone)]
pub struct TenantId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for TenantId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| TenantId(v.to_string()))
            .ok_or_else(|| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "MISSING_TENANT",
                    format!("{} header is required", TENANT_HEADER),
                )
            })
    }
}

/// Unwraps a JSON body. Oversized bodies map to 413; anything else unparseable to 422.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>, expected: &str) -> ApiResult<T> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => Err(ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "PAYLOAD_TOO_LARGE",
            rejection.body_text(),
        )),
        Err(rejection) => Err(ApiError::invalid_json(rejection, expected)),
    }
}

pub fn parse_product_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_PRODUCT_ID",
            format!("'{}' is not a valid product id", raw),
        )
    })
}
