use crate::{
    auth::AuthUser,
    entities::sale,
    errors::ServiceError,
    handlers::common::{DataResponse, PaginatedResponse, DEFAULT_PAGE, DEFAULT_PAGE_SIZE},
    services::sales::{RecordSaleRequest, SaleFilter, SaleResponse},
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
pub struct ListSalesParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub product_id: Option<i64>,
    pub reseller_id: Option<i64>,
}

/// Record a sale against the reseller's own stock (resellers only).
#[utoipa::path(
    post,
    path = "/api/v1/sales",
    request_body = RecordSaleRequest,
    responses(
        (status = 201, description = "Sale recorded", body = sale::Model),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Sales"
)]
pub async fn record_sale(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<RecordSaleRequest>,
) -> Result<(StatusCode, Json<DataResponse<sale::Model>>), ServiceError> {
    if auth.is_admin() {
        return Err(ServiceError::Forbidden(
            "only resellers can record sales".to_string(),
        ));
    }

    let sale = state.sales.record_sale(auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(sale))))
}

/// List sales. Resellers see their own; admins see all.
async fn list_sales(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListSalesParams>,
) -> Result<Json<PaginatedResponse<SaleResponse>>, ServiceError> {
    let reseller_id = if auth.is_admin() {
        params.reseller_id
    } else {
        Some(auth.user_id)
    };

    let filter = SaleFilter {
        page: params.page.unwrap_or(DEFAULT_PAGE),
        page_size: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        reseller_id,
        product_id: params.product_id,
    };

    let (sales, total) = state.sales.list_sales(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        sales,
        filter.page,
        filter.page_size,
        total,
    )))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sales", post(record_sale))
        .route("/sales", get(list_sales))
}
