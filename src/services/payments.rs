use crate::{
    db::DbPool,
    entities::{
        alert, payment,
        payment::{PaymentMethod, RecordedBy},
        user,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::users::UserSummary,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordPaymentRequest {
    pub reseller_id: i64,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    /// Defaults to today when omitted.
    pub date_paid: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    #[serde(flatten)]
    pub payment: payment::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

#[derive(Debug, Default)]
pub struct PaymentFilter {
    pub page: u64,
    pub page_size: u64,
    pub search: Option<String>,
    pub reseller_id: Option<i64>,
    pub method: Option<String>,
    pub recorded_by: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl PaymentService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Appends a payment. Payments are never updated or deleted; the balance
    /// they affect is always derived from the full history.
    #[instrument(skip(self, request), fields(reseller_id = request.reseller_id, amount = %request.amount))]
    pub async fn record_payment(
        &self,
        request: RecordPaymentRequest,
        recorded_by: RecordedBy,
    ) -> Result<payment::Model, ServiceError> {
        request.validate()?;

        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "amount must be positive".to_string(),
            ));
        }

        let reseller = user::Entity::find_by_id(request.reseller_id)
            .filter(user::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("reseller".to_string()))?;

        let date_paid = request.date_paid.unwrap_or_else(|| Utc::now().date_naive());

        let txn = self.db.begin().await?;

        let model = payment::ActiveModel {
            reseller_id: Set(request.reseller_id),
            amount: Set(request.amount),
            method: Set(request.method.to_string()),
            reference: Set(request.reference.filter(|r| !r.is_empty())),
            recorded_by: Set(recorded_by.to_string()),
            date_paid: Set(date_paid),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        alert::ActiveModel {
            alert_type: Set("PAYMENT_RECEIVED".to_string()),
            title: Set("Payment Received".to_string()),
            description: Set(format!("KES {} from {}", request.amount, reseller.name)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(payment_id = model.id, "payment recorded");

        if let Err(e) = self
            .event_sender
            .send(Event::PaymentRecorded {
                payment_id: model.id,
                reseller_id: model.reseller_id,
                amount: model.amount,
            })
            .await
        {
            warn!(error = %e, "failed to publish payment event");
        }

        Ok(model)
    }

    pub async fn list_payments(
        &self,
        filter: &PaymentFilter,
    ) -> Result<(Vec<PaymentResponse>, u64), ServiceError> {
        let mut query = payment::Entity::find()
            .find_also_related(user::Entity)
            .order_by_desc(payment::Column::DatePaid)
            .order_by_desc(payment::Column::Id);

        if let Some(reseller_id) = filter.reseller_id {
            query = query.filter(payment::Column::ResellerId.eq(reseller_id));
        }
        if let Some(method) = &filter.method {
            query = query.filter(payment::Column::Method.eq(method.clone()));
        }
        if let Some(recorded_by) = &filter.recorded_by {
            query = query.filter(payment::Column::RecordedBy.eq(recorded_by.clone()));
        }
        if let Some(from) = filter.date_from {
            query = query.filter(payment::Column::DatePaid.gte(from));
        }
        if let Some(to) = filter.date_to {
            query = query.filter(payment::Column::DatePaid.lte(to));
        }
        if let Some(search) = &filter.search {
            let needle = format!("%{}%", search.to_lowercase());
            query = query.filter(
                Expr::expr(Func::lower(Expr::col((user::Entity, user::Column::Name))))
                    .like(needle),
            );
        }

        let paginator = query.paginate(&*self.db, filter.page_size.max(1));
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(filter.page.max(1) - 1).await?;

        let payments = rows
            .into_iter()
            .map(|(payment, reseller)| PaymentResponse {
                user: reseller.as_ref().map(UserSummary::from),
                payment,
            })
            .collect();

        Ok((payments, total))
    }
}
