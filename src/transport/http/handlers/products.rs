use crate::app::ProductInput;
use crate::transport::http::error::ApiResult;
use crate::transport::http::handlers::common::{json_body, parse_product_id, TenantId};
use crate::transport::http::types::{ApiResponse, AppState, DeleteProductQuery, ListProductsQuery};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

#[utoipa::path(
    get,
    path = "/api/products",
    params(ListProductsQuery),
    responses(
        (status = 200, description = "Tenant's products, newest first", body = ApiResponse),
        (status = 400, description = "tenant_id missing", body = ApiResponse),
        (status = 502, description = "Row store failure", body = ApiResponse)
    )
)]
pub async fn list_products_handler(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> ApiResult<Json<ApiResponse>> {
    let tenant_id = query.tenant_id.as_deref().unwrap_or_default();
    let products = state.catalog.list(tenant_id, query.active).await?;
    Ok(Json(ApiResponse::ok(products)))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = String, Path, description = "Product id (UUID)")),
    responses(
        (status = 200, description = "Product", body = ApiResponse),
        (status = 404, description = "Unknown product", body = ApiResponse)
    )
)]
pub async fn get_product_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse>> {
    let product = state.catalog.get(parse_product_id(&id)?).await?;
    Ok(Json(ApiResponse::ok(product)))
}

#[utoipa::path(
    post,
    path = "/api/products",
    params(("x-tenant-id" = String, Header, description = "Caller's tenant")),
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product created", body = ApiResponse),
        (status = 200, description = "Product updated", body = ApiResponse),
        (status = 400, description = "Validation failed", body = ApiResponse),
        (status = 403, description = "Product belongs to another tenant", body = ApiResponse),
        (status = 404, description = "Product vanished", body = ApiResponse),
        (status = 409, description = "Stale expected_updated_at", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn upsert_product_handler(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    body: Result<Json<ProductInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse>)> {
    let input = json_body(
        body,
        "{\"name\", \"content_path\", \"price_token\", \"price_amount\", \"stock\"|\"unlimited\", ...}",
    )?;
    let status = if input.id.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let product = state.catalog.upsert(&tenant_id, input).await?;
    Ok((status, Json(ApiResponse::ok(product))))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = String, Path, description = "Product id (UUID)"),
        ("x-tenant-id" = String, Header, description = "Caller's tenant"),
        DeleteProductQuery
    ),
    responses(
        (status = 200, description = "Product deactivated, or deleted with file removal report", body = ApiResponse),
        (status = 403, description = "Product belongs to another tenant", body = ApiResponse),
        (status = 404, description = "Unknown product", body = ApiResponse),
        (status = 409, description = "Stale version or product has purchases", body = ApiResponse)
    )
)]
pub async fn delete_product_handler(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(id): Path<String>,
    Query(query): Query<DeleteProductQuery>,
) -> ApiResult<Json<ApiResponse>> {
    let product_id = parse_product_id(&id)?;
    if query.hard {
        let report = state.catalog.delete(&tenant_id, product_id).await?;
        return Ok(Json(ApiResponse::ok(report)));
    }
    let product = state
        .catalog
        .deactivate(&tenant_id, product_id, query.expected_updated_at)
        .await?;
    Ok(Json(ApiResponse::ok(product)))
}
