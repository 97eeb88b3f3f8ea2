use crate::{
    db::DbPool,
    entities::{
        alert, goods_request,
        goods_request::{GoodsRequestLine, GoodsRequestStatus},
        user,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::distribution::{distribute_in_txn, DistributeStockRequest},
    services::users::UserSummary,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize, ToSchema)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GoodsRequestResponse {
    pub id: i64,
    pub reseller_id: i64,
    pub payload: Vec<GoodsRequestLine>,
    pub status: String,
    pub comment: Option<String>,
    pub cancelled: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

impl GoodsRequestResponse {
    fn from_model(
        model: goods_request::Model,
        user: Option<UserSummary>,
    ) -> Result<Self, ServiceError> {
        let payload: Vec<GoodsRequestLine> = serde_json::from_value(model.payload)
            .map_err(|e| ServiceError::InternalError(format!("corrupt request payload: {e}")))?;

        Ok(Self {
            id: model.id,
            reseller_id: model.reseller_id,
            payload,
            status: model.status,
            comment: model.comment,
            cancelled: model.cancelled,
            cancelled_at: model.cancelled_at,
            updated_at: model.updated_at,
            created_at: model.created_at,
            user,
        })
    }
}

#[derive(Debug, Default)]
pub struct GoodsRequestFilter {
    pub page: u64,
    pub page_size: u64,
    pub reseller_id: Option<i64>,
    pub status: Option<String>,
}

#[derive(Clone)]
pub struct GoodsRequestService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl GoodsRequestService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    fn validate_lines(lines: &[GoodsRequestLine]) -> Result<(), ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "request must contain at least one product".to_string(),
            ));
        }

        for line in lines {
            if line.quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "quantity for {} must be positive",
                    line.product_name
                )));
            }
            if line.price_requested <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "price for {} must be positive",
                    line.product_name
                )));
            }
        }

        Ok(())
    }

    #[instrument(skip(self, lines))]
    pub async fn create_request(
        &self,
        reseller_id: i64,
        lines: Vec<GoodsRequestLine>,
    ) -> Result<GoodsRequestResponse, ServiceError> {
        Self::validate_lines(&lines)?;

        let now = Utc::now();
        let model = goods_request::ActiveModel {
            reseller_id: Set(reseller_id),
            payload: Set(serde_json::to_value(&lines)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?),
            status: Set(GoodsRequestStatus::Pending.to_string()),
            comment: Set(None),
            cancelled: Set(false),
            cancelled_at: Set(None),
            updated_at: Set(now),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(request_id = model.id, "goods request created");

        if let Err(e) = self
            .event_sender
            .send(Event::GoodsRequestCreated(model.id))
            .await
        {
            warn!(error = %e, "failed to publish goods request event");
        }

        GoodsRequestResponse::from_model(model, None)
    }

    pub async fn list_requests(
        &self,
        filter: &GoodsRequestFilter,
    ) -> Result<(Vec<GoodsRequestResponse>, u64), ServiceError> {
        let mut query = goods_request::Entity::find()
            .find_also_related(user::Entity)
            .order_by_desc(goods_request::Column::CreatedAt)
            .order_by_desc(goods_request::Column::Id);

        if let Some(reseller_id) = filter.reseller_id {
            query = query.filter(goods_request::Column::ResellerId.eq(reseller_id));
        }
        if let Some(status) = &filter.status {
            query = query.filter(goods_request::Column::Status.eq(status.clone()));
        }

        let paginator = query.paginate(&*self.db, filter.page_size.max(1));
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(filter.page.max(1) - 1).await?;

        let requests = rows
            .into_iter()
            .map(|(model, reseller)| {
                GoodsRequestResponse::from_model(model, reseller.as_ref().map(UserSummary::from))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((requests, total))
    }

    pub async fn get_request(&self, id: i64) -> Result<GoodsRequestResponse, ServiceError> {
        let model = goods_request::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("goods request".to_string()))?;

        GoodsRequestResponse::from_model(model, None)
    }

    /// Replaces the payload wholesale. Only the owning reseller may update,
    /// and only while the request is still pending and not cancelled.
    #[instrument(skip(self, lines))]
    pub async fn update_payload(
        &self,
        id: i64,
        reseller_id: i64,
        lines: Vec<GoodsRequestLine>,
    ) -> Result<GoodsRequestResponse, ServiceError> {
        Self::validate_lines(&lines)?;

        let model = goods_request::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("goods request".to_string()))?;

        if model.reseller_id != reseller_id {
            return Err(ServiceError::Forbidden(
                "goods request belongs to another reseller".to_string(),
            ));
        }
        Self::ensure_open(&model)?;

        let mut active: goods_request::ActiveModel = model.into();
        active.payload = Set(serde_json::to_value(&lines)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?);
        active.updated_at = Set(Utc::now());
        let model = active.update(&*self.db).await?;

        if let Err(e) = self
            .event_sender
            .send(Event::GoodsRequestUpdated(model.id))
            .await
        {
            warn!(error = %e, "failed to publish goods request event");
        }

        GoodsRequestResponse::from_model(model, None)
    }

    /// Cancels a pending request. The status stays PENDING; `cancelled` alone
    /// makes the request terminal.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: i64, reseller_id: i64) -> Result<(), ServiceError> {
        let model = goods_request::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("goods request".to_string()))?;

        if model.reseller_id != reseller_id {
            return Err(ServiceError::Forbidden(
                "goods request belongs to another reseller".to_string(),
            ));
        }
        Self::ensure_open(&model)?;

        // Guarded flip so two concurrent cancels (or a cancel racing a
        // decision) cannot both pass the check above.
        let updated = goods_request::Entity::update_many()
            .col_expr(goods_request::Column::Cancelled, Expr::value(true))
            .col_expr(
                goods_request::Column::CancelledAt,
                Expr::value(Some(Utc::now())),
            )
            .col_expr(goods_request::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(goods_request::Column::Id.eq(id))
            .filter(goods_request::Column::Status.eq(GoodsRequestStatus::Pending.to_string()))
            .filter(goods_request::Column::Cancelled.eq(false))
            .exec(&*self.db)
            .await?;

        if updated.rows_affected != 1 {
            return Err(ServiceError::InvalidTransition(
                "goods request is no longer pending".to_string(),
            ));
        }

        info!(request_id = id, "goods request cancelled");

        if let Err(e) = self
            .event_sender
            .send(Event::GoodsRequestCancelled(id))
            .await
        {
            warn!(error = %e, "failed to publish goods request event");
        }

        Ok(())
    }

    /// Applies an admin decision. Approval creates one distribution per
    /// payload line, priced at the requested price, in the same transaction
    /// as the status flip: if any line cannot be covered the approval rolls
    /// back entirely and the request stays pending.
    #[instrument(skip(self, comment, decision), fields(decision = %decision))]
    pub async fn decide(
        &self,
        id: i64,
        decision: Decision,
        comment: &str,
    ) -> Result<GoodsRequestResponse, ServiceError> {
        if comment.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "a comment is required when deciding a request".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let model = goods_request::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("goods request".to_string()))?;

        let new_status = match decision {
            Decision::Approve => GoodsRequestStatus::Approved,
            Decision::Reject => GoodsRequestStatus::Rejected,
        };

        // Guarded transition out of PENDING; rows_affected == 0 means another
        // decision or a cancellation got there first.
        let updated = goods_request::Entity::update_many()
            .col_expr(
                goods_request::Column::Status,
                Expr::value(new_status.to_string()),
            )
            .col_expr(
                goods_request::Column::Comment,
                Expr::value(Some(comment.trim().to_string())),
            )
            .col_expr(goods_request::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(goods_request::Column::Id.eq(id))
            .filter(goods_request::Column::Status.eq(GoodsRequestStatus::Pending.to_string()))
            .filter(goods_request::Column::Cancelled.eq(false))
            .exec(&txn)
            .await?;

        if updated.rows_affected != 1 {
            return Err(ServiceError::InvalidTransition(
                "goods request has already been decided or cancelled".to_string(),
            ));
        }

        if decision == Decision::Approve {
            let lines: Vec<GoodsRequestLine> = serde_json::from_value(model.payload.clone())
                .map_err(|e| {
                    ServiceError::InternalError(format!("corrupt request payload: {e}"))
                })?;

            for line in &lines {
                distribute_in_txn(
                    &txn,
                    &DistributeStockRequest {
                        reseller_id: model.reseller_id,
                        product_id: line.product_id,
                        quantity: line.quantity,
                        unit_price: line.price_requested,
                        date_distributed: None,
                    },
                )
                .await?;
            }

            alert::ActiveModel {
                alert_type: Set("REQUEST_APPROVED".to_string()),
                title: Set("Goods Request Approved".to_string()),
                description: Set(format!("Request #{id} approved and stock distributed")),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(request_id = id, status = %new_status, "goods request decided");

        let event = match decision {
            Decision::Approve => Event::GoodsRequestApproved(id),
            Decision::Reject => Event::GoodsRequestRejected(id),
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "failed to publish goods request event");
        }

        self.get_request(id).await
    }

    fn ensure_open(model: &goods_request::Model) -> Result<(), ServiceError> {
        if model.cancelled {
            return Err(ServiceError::InvalidTransition(
                "goods request has been cancelled".to_string(),
            ));
        }
        if model.status != GoodsRequestStatus::Pending.to_string() {
            return Err(ServiceError::InvalidTransition(format!(
                "goods request is already {}",
                model.status
            )));
        }
        Ok(())
    }
}
