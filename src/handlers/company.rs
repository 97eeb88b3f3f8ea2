use crate::{
    auth::AuthUser,
    entities::{product_batch, stock_distribution},
    errors::ServiceError,
    handlers::common::{
        ensure_admin, DataResponse, PaginatedResponse, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
    },
    services::distribution::{DistributeStockRequest, DistributionFilter, DistributionResponse},
    services::inventory::{
        AddBatchRequest, BatchFilter, BatchResponse, CompanyStockFilter, CompanyStockRow,
    },
    AppState,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListBatchesParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub product_id: Option<i64>,
    pub in_stock: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListDistributionsParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub product_id: Option<i64>,
    pub reseller_id: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCompanyStockParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub in_stock: Option<bool>,
}

/// Record a purchased batch of product (admin only).
#[utoipa::path(
    post,
    path = "/api/v1/company/stock-purchase",
    request_body = AddBatchRequest,
    responses(
        (status = 201, description = "Batch recorded", body = product_batch::Model),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Company"
)]
pub async fn add_batch(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<AddBatchRequest>,
) -> Result<(StatusCode, Json<DataResponse<product_batch::Model>>), ServiceError> {
    ensure_admin(&auth)?;

    let batch = state.inventory.add_batch(request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(batch))))
}

async fn list_batches(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListBatchesParams>,
) -> Result<Json<PaginatedResponse<BatchResponse>>, ServiceError> {
    ensure_admin(&auth)?;

    let filter = BatchFilter {
        page: params.page.unwrap_or(DEFAULT_PAGE),
        page_size: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        product_id: params.product_id,
        in_stock: params.in_stock,
        search: params.search,
    };

    let (batches, total) = state.inventory.list_batches(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        batches,
        filter.page,
        filter.page_size,
        total,
    )))
}

/// Distribute stock from company batches to a reseller (admin only).
#[utoipa::path(
    post,
    path = "/api/v1/company/stock-distributions",
    request_body = DistributeStockRequest,
    responses(
        (status = 201, description = "Stock distributed", body = stock_distribution::Model),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Company"
)]
pub async fn distribute_stock(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<DistributeStockRequest>,
) -> Result<(StatusCode, Json<DataResponse<stock_distribution::Model>>), ServiceError> {
    ensure_admin(&auth)?;

    let distribution = state.distributions.distribute(request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(distribution))))
}

async fn list_distributions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListDistributionsParams>,
) -> Result<Json<PaginatedResponse<DistributionResponse>>, ServiceError> {
    ensure_admin(&auth)?;

    let filter = DistributionFilter {
        page: params.page.unwrap_or(DEFAULT_PAGE),
        page_size: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        reseller_id: params.reseller_id,
        product_id: params.product_id,
        search: params.search,
    };

    let (distributions, total) = state.distributions.list_distributions(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        distributions,
        filter.page,
        filter.page_size,
        total,
    )))
}

async fn list_company_stock(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListCompanyStockParams>,
) -> Result<Json<PaginatedResponse<CompanyStockRow>>, ServiceError> {
    ensure_admin(&auth)?;

    let filter = CompanyStockFilter {
        page: params.page.unwrap_or(DEFAULT_PAGE),
        page_size: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        search: params.search,
        in_stock: params.in_stock,
    };

    let (stock, total) = state.inventory.list_company_stock(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        stock,
        filter.page,
        filter.page_size,
        total,
    )))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/company/stock-purchase", post(add_batch))
        .route("/company/stock-purchase", get(list_batches))
        .route("/company/stock-distributions", post(distribute_stock))
        .route("/company/stock-distributions", get(list_distributions))
        .route("/company/stock", get(list_company_stock))
}
