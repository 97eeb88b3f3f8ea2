use crate::{
    auth::AuthUser,
    entities::stock_movement::StockOwner,
    errors::ServiceError,
    handlers::common::{PaginatedResponse, DEFAULT_PAGE, DEFAULT_PAGE_SIZE},
    services::movements::{MovementFilter, StockMovementResponse},
    AppState,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListMovementsParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub product_id: Option<i64>,
    pub owner_type: Option<String>,
    pub owner_id: Option<i64>,
    pub movement_type: Option<String>,
    pub source: Option<String>,
}

/// Browse the stock ledger. Resellers are scoped to their own movements;
/// admins see everything.
#[utoipa::path(
    get,
    path = "/api/v1/stock-movements",
    params(ListMovementsParams),
    responses(
        (status = 200, description = "Paginated ledger entries")
    ),
    security(("bearer_auth" = [])),
    tag = "StockMovements"
)]
pub async fn list_stock_movements(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListMovementsParams>,
) -> Result<Json<PaginatedResponse<StockMovementResponse>>, ServiceError> {
    let (owner_type, owner_id) = if auth.is_admin() {
        (params.owner_type, params.owner_id)
    } else {
        (Some(StockOwner::Reseller.to_string()), Some(auth.user_id))
    };

    let filter = MovementFilter {
        page: params.page.unwrap_or(DEFAULT_PAGE),
        page_size: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        search: params.search,
        product_id: params.product_id,
        owner_type,
        owner_id,
        movement_type: params.movement_type,
        source: params.source,
    };

    let (movements, total) = state.movements.list_movements(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        movements,
        filter.page,
        filter.page_size,
        total,
    )))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/stock-movements", get(list_stock_movements))
}
