use crate::{
    auth::AuthUser,
    entities::reseller_stock,
    errors::ServiceError,
    handlers::common::{DataResponse, PaginatedResponse, DEFAULT_PAGE, DEFAULT_PAGE_SIZE},
    services::resellers::{
        ResellerAccount, ResellerOverview, ResellerStockFilter, ResellerStockResponse,
        UpdateStockThresholdRequest,
    },
    services::users::UserSummary,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListResellerStockParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub reseller_id: Option<i64>,
    pub in_stock: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListResellersParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

/// Reseller stock. Resellers see their own rows; admins may filter by
/// reseller.
async fn list_reseller_stock(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListResellerStockParams>,
) -> Result<Json<PaginatedResponse<ResellerStockResponse>>, ServiceError> {
    let reseller_id = if auth.is_admin() {
        params.reseller_id
    } else {
        Some(auth.user_id)
    };

    let filter = ResellerStockFilter {
        page: params.page.unwrap_or(DEFAULT_PAGE),
        page_size: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        reseller_id,
        search: params.search,
        in_stock: params.in_stock,
    };

    let (stock, total) = state.resellers.list_stock(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        stock,
        filter.page,
        filter.page_size,
        total,
    )))
}

/// Update the low-stock threshold on one of the caller's stock rows.
async fn update_stock_threshold(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateStockThresholdRequest>,
) -> Result<Json<DataResponse<reseller_stock::Model>>, ServiceError> {
    let stock = state
        .resellers
        .update_stock_threshold(auth.user_id, request)
        .await?;
    Ok(Json(DataResponse::new(stock)))
}

/// A reseller's derived account. Resellers may only read their own.
#[utoipa::path(
    get,
    path = "/api/v1/resellers/:id/account",
    params(("id" = i64, Path, description = "Reseller id")),
    responses(
        (status = 200, description = "Derived account totals and balance"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Resellers"
)]
pub async fn get_reseller_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DataResponse<ResellerAccount>>, ServiceError> {
    if !auth.is_admin() && auth.user_id != id {
        return Err(ServiceError::Forbidden(
            "cannot view another reseller's account".to_string(),
        ));
    }

    let account = state.resellers.account(id).await?;
    Ok(Json(DataResponse::new(account)))
}

/// Stock rows for the reseller's threshold form.
async fn stock_form_options(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<DataResponse<Vec<serde_json::Value>>>, ServiceError> {
    let options = state.resellers.stock_form_options(auth.user_id).await?;
    Ok(Json(DataResponse::new(options)))
}

/// Admin listing of resellers with their account positions.
async fn list_resellers(
    State(state): State<AppState>,
    Query(params): Query<ListResellersParams>,
) -> Result<Json<PaginatedResponse<ResellerOverview>>, ServiceError> {
    let page = params.page.unwrap_or(DEFAULT_PAGE);
    let page_size = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    let (resellers, total) = state
        .resellers
        .list_resellers(page, page_size, params.search.as_deref())
        .await?;

    Ok(Json(PaginatedResponse::new(resellers, page, page_size, total)))
}

async fn get_reseller(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DataResponse<UserSummary>>, ServiceError> {
    let reseller = state.resellers.get_reseller(id).await?;
    Ok(Json(DataResponse::new(reseller)))
}

/// Routes available to any authenticated user.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/resellers/stock", get(list_reseller_stock))
        .route("/resellers/stock/form", get(stock_form_options))
        .route("/resellers/stock-threshold", put(update_stock_threshold))
        .route("/resellers/:id/account", get(get_reseller_account))
}

/// Admin-only reseller routes, mounted under `/admin`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/resellers", get(list_resellers))
        .route("/resellers/:id", get(get_reseller))
}
