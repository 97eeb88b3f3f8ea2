use crate::{
    auth::AuthUser,
    entities::payment,
    entities::payment::RecordedBy,
    errors::ServiceError,
    handlers::common::{
        ensure_admin, DataResponse, PaginatedResponse, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
    },
    services::payments::{PaymentFilter, PaymentResponse, RecordPaymentRequest},
    AppState,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPaymentsParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub reseller_id: Option<i64>,
    pub method: Option<String>,
    pub recorded_by: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Record a payment from a reseller (admin only).
#[utoipa::path(
    post,
    path = "/api/v1/payments",
    request_body = RecordPaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = payment::Model),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn record_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<DataResponse<payment::Model>>), ServiceError> {
    ensure_admin(&auth)?;

    let payment = state
        .payments
        .record_payment(request, RecordedBy::Admin)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(payment))))
}

/// List payments. Resellers see their own; admins see all.
async fn list_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListPaymentsParams>,
) -> Result<Json<PaginatedResponse<PaymentResponse>>, ServiceError> {
    let reseller_id = if auth.is_admin() {
        params.reseller_id
    } else {
        Some(auth.user_id)
    };

    let filter = PaymentFilter {
        page: params.page.unwrap_or(DEFAULT_PAGE),
        page_size: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        search: params.search,
        reseller_id,
        method: params.method,
        recorded_by: params.recorded_by,
        date_from: params.date_from,
        date_to: params.date_to,
    };

    let (payments, total) = state.payments.list_payments(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        payments,
        filter.page,
        filter.page_size,
        total,
    )))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments", post(record_payment))
        .route("/payments", get(list_payments))
}
