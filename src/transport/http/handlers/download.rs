use crate::transport::http::error::ApiResult;
use crate::transport::http::types::AppState;
use axum::extract::{Path, State};
use axum::response::Redirect;

#[utoipa::path(
    get,
    path = "/api/download/{token}",
    params(("token" = String, Path, description = "Download token")),
    responses(
        (status = 307, description = "Redirect to a signed URL valid for 10 minutes"),
        (status = 404, description = "Unknown token", body = crate::transport::http::types::ApiResponse),
        (status = 409, description = "TOKEN_ALREADY_USED", body = crate::transport::http::types::ApiResponse),
        (status = 410, description = "TOKEN_EXPIRED", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn download_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Redirect> {
    let redemption = state.purchases.redeem(&token).await?;
    Ok(Redirect::temporary(&redemption.url))
}
