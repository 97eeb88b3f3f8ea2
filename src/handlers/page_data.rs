use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::DataResponse,
    AppState,
};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;

/// Admin page aggregates, served through the short-TTL response cache.
#[utoipa::path(
    get,
    path = "/api/v1/admin/page-data/:page",
    params(("page" = String, Path, description = "dashboard | products | batches | distributions | goods_requests | payments | resellers | stock_movements")),
    responses(
        (status = 200, description = "Aggregate bundle for the page"),
        (status = 400, description = "Unknown page", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "PageData"
)]
pub async fn admin_page_data(
    State(state): State<AppState>,
    Path(page): Path<String>,
) -> Result<Json<DataResponse<Value>>, ServiceError> {
    let cache_key = format!("admin:page-data:{page}");
    if let Some(cached) = state.page_cache.get(&cache_key) {
        return Ok(Json(DataResponse::new(cached)));
    }

    let data = state.stats.admin_page_data(&page).await?;
    state.page_cache.insert(cache_key, data.clone());

    Ok(Json(DataResponse::new(data)))
}

/// Reseller page aggregates, scoped to the authenticated reseller.
async fn reseller_page_data(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(page): Path<String>,
) -> Result<Json<DataResponse<Value>>, ServiceError> {
    let cache_key = format!("reseller:{}:page-data:{page}", auth.user_id);
    if let Some(cached) = state.page_cache.get(&cache_key) {
        return Ok(Json(DataResponse::new(cached)));
    }

    let data = state.stats.reseller_page_data(auth.user_id, &page).await?;
    state.page_cache.insert(cache_key, data.clone());

    Ok(Json(DataResponse::new(data)))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/resellers/page-data/:page", get(reseller_page_data))
}

/// Mounted under `/admin`.
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/page-data/:page", get(admin_page_data))
}
