use crate::{
    auth::AuthUser,
    entities::goods_request::GoodsRequestLine,
    errors::ServiceError,
    handlers::common::{
        ensure_admin, DataResponse, PaginatedResponse, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
    },
    services::goods_requests::{
        Decision, GoodsRequestFilter, GoodsRequestResponse,
    },
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct GoodsRequestBody {
    pub data: Vec<GoodsRequestLine>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecisionBody {
    pub comment: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListGoodsRequestsParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
    pub reseller_id: Option<i64>,
}

/// Create a goods request (resellers only).
#[utoipa::path(
    post,
    path = "/api/v1/goods-requests",
    request_body = GoodsRequestBody,
    responses(
        (status = 201, description = "Goods request created"),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "GoodsRequests"
)]
pub async fn create_goods_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<GoodsRequestBody>,
) -> Result<(StatusCode, Json<DataResponse<GoodsRequestResponse>>), ServiceError> {
    if auth.is_admin() {
        return Err(ServiceError::Forbidden(
            "only resellers can create goods requests".to_string(),
        ));
    }

    let request = state
        .goods_requests
        .create_request(auth.user_id, body.data)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(request))))
}

/// List goods requests. Resellers see their own; admins see all and may
/// filter by reseller.
async fn list_goods_requests(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListGoodsRequestsParams>,
) -> Result<Json<PaginatedResponse<GoodsRequestResponse>>, ServiceError> {
    let reseller_id = if auth.is_admin() {
        params.reseller_id
    } else {
        Some(auth.user_id)
    };

    let filter = GoodsRequestFilter {
        page: params.page.unwrap_or(DEFAULT_PAGE),
        page_size: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        reseller_id,
        status: params.status,
    };

    let (requests, total) = state.goods_requests.list_requests(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        requests,
        filter.page,
        filter.page_size,
        total,
    )))
}

/// Replace the payload of a pending request (owning reseller only).
async fn update_goods_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<GoodsRequestBody>,
) -> Result<Json<DataResponse<GoodsRequestResponse>>, ServiceError> {
    let request = state
        .goods_requests
        .update_payload(id, auth.user_id, body.data)
        .await?;
    Ok(Json(DataResponse::new(request)))
}

/// Cancel a pending request (owning reseller only).
#[utoipa::path(
    post,
    path = "/api/v1/goods-requests/:id/cancel",
    params(("id" = i64, Path, description = "Goods request id")),
    responses(
        (status = 200, description = "Request cancelled"),
        (status = 422, description = "Request is no longer pending", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "GoodsRequests"
)]
pub async fn cancel_goods_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DataResponse<&'static str>>, ServiceError> {
    state.goods_requests.cancel(id, auth.user_id).await?;
    Ok(Json(DataResponse::new("goods request cancelled successfully")))
}

/// Approve a pending request, distributing each requested line (admin only).
#[utoipa::path(
    post,
    path = "/api/v1/goods-requests/:id/approve",
    params(("id" = i64, Path, description = "Goods request id")),
    request_body = DecisionBody,
    responses(
        (status = 200, description = "Request approved and stock distributed"),
        (status = 422, description = "Invalid transition or insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "GoodsRequests"
)]
pub async fn approve_goods_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<DataResponse<GoodsRequestResponse>>, ServiceError> {
    ensure_admin(&auth)?;

    let request = state
        .goods_requests
        .decide(id, Decision::Approve, &body.comment)
        .await?;
    Ok(Json(DataResponse::new(request)))
}

/// Reject a pending request (admin only).
async fn reject_goods_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<DataResponse<GoodsRequestResponse>>, ServiceError> {
    ensure_admin(&auth)?;

    let request = state
        .goods_requests
        .decide(id, Decision::Reject, &body.comment)
        .await?;
    Ok(Json(DataResponse::new(request)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/goods-requests", post(create_goods_request))
        .route("/goods-requests", get(list_goods_requests))
        .route("/goods-requests/:id", put(update_goods_request))
        .route("/goods-requests/:id/cancel", post(cancel_goods_request))
        .route("/goods-requests/:id/approve", post(approve_goods_request))
        .route("/goods-requests/:id/reject", post(reject_goods_request))
}
