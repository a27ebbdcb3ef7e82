use crate::domain::model::Bucket;
use crate::domain::StorefrontError;
use crate::transport::http::error::ApiResult;
use crate::transport::http::handlers::common::json_body;
use crate::transport::http::types::{ApiResponse, AppState, DeleteFileRequest, UploadFileRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

#[utoipa::path(
    post,
    path = "/api/files",
    request_body = UploadFileRequest,
    responses(
        (status = 201, description = "Stored; public_url is null for private buckets", body = ApiResponse),
        (status = 400, description = "Empty payload, bad base64 or unknown bucket", body = ApiResponse),
        (status = 413, description = "Decoded file exceeds 25 MiB", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 502, description = "Blob storage failure", body = ApiResponse)
    )
)]
pub async fn upload_file_handler(
    State(state): State<AppState>,
    body: Result<Json<UploadFileRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse>)> {
    let request = json_body(
        body,
        "{\"file\": \"<base64>\", \"bucket\": \"...\", \"file_name\"?, \"content_type\"?}",
    )?;
    let bucket: Bucket = request
        .bucket
        .parse()
        .map_err(|e: String| StorefrontError::validation_code("INVALID_BUCKET", e))?;
    let stored = state
        .files
        .upload(
            &request.file,
            bucket,
            request.file_name.as_deref(),
            request.content_type.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(stored))))
}

#[utoipa::path(
    delete,
    path = "/api/files",
    request_body = DeleteFileRequest,
    responses(
        (status = 200, description = "Private file removed", body = ApiResponse),
        (status = 400, description = "Empty path or path traversal", body = ApiResponse),
        (status = 502, description = "Blob storage failure", body = ApiResponse)
    )
)]
pub async fn delete_file_handler(
    State(state): State<AppState>,
    body: Result<Json<DeleteFileRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let request = json_body(body, "{\"path\": \"...\"}")?;
    state.files.delete_private(&request.path).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "removed": request.path }))))
}
