//! Maps service errors onto HTTP statuses and the `ApiResponse` envelope.
//!
//! The machine-readable error code always lands in `data.code`; `error` carries the message.

use crate::domain::StorefrontError;
use crate::transport::http::types::ApiResponse;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiResponse::failure(Some(json!({ "code": code })), message),
        }
    }

    /// 422 for a body that did not deserialize, naming the expected shape.
    pub fn invalid_json(rejection: JsonRejection, expected: &str) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_JSON",
            format!("Invalid JSON body: {} (expected: {})", rejection.body_text(), expected),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<StorefrontError> for ApiError {
    fn from(err: StorefrontError) -> Self {
        let message = err.to_string();
        match err {
            StorefrontError::Validation { code, .. } => Self::new(StatusCode::BAD_REQUEST, code, message),
            StorefrontError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            StorefrontError::Forbidden(_) => Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message),
            StorefrontError::Unauthorized(_) => {
                Self::new(StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE", message)
            }
            StorefrontError::Conflict { code, .. } => Self::new(StatusCode::CONFLICT, code, message),
            StorefrontError::Gone(_) => Self::new(StatusCode::GONE, "TOKEN_EXPIRED", message),
            StorefrontError::SoldOut => Self::new(StatusCode::CONFLICT, "SOLD_OUT", message),
            StorefrontError::PayloadTooLarge { limit, actual } => Self {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                body: ApiResponse::failure(
                    Some(json!({ "code": "PAYLOAD_TOO_LARGE", "limit": limit, "actual": actual })),
                    message,
                ),
            },
            StorefrontError::Upstream { context, detail } => {
                tracing::error!(context, detail = %detail, "upstream failure");
                Self {
                    status: StatusCode::BAD_GATEWAY,
                    body: ApiResponse::failure(
                        Some(json!({ "code": "UPSTREAM_ERROR", "source": context, "detail": detail })),
                        format!("{} request failed", context),
                    ),
                }
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
