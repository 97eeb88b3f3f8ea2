use crate::{
    db::DbPool,
    entities::{
        product, reseller_lot, reseller_stock, sale,
        stock_movement::{MovementSource, MovementType, StockOwner},
        user,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::ProductSummary,
    services::movements::{record_movement, record_movement_batch, NewMovement},
    services::users::UserSummary,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use sea_orm::ActiveModelTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordSaleRequest {
    pub product_id: i64,
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,
    pub selling_price: Decimal,
    /// Defaults to today when omitted.
    pub date_sold: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SaleResponse {
    #[serde(flatten)]
    pub sale: sale::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

#[derive(Debug, Default)]
pub struct SaleFilter {
    pub page: u64,
    pub page_size: u64,
    pub reseller_id: Option<i64>,
    pub product_id: Option<i64>,
}

#[derive(Clone)]
pub struct SalesService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl SalesService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Records a sale against the reseller's own stock. The stock decrement
    /// is a guarded update, so a sale can never drive the quantity negative
    /// even under concurrent requests; the lot consumption, ledger entry and
    /// sale row commit together or not at all.
    #[instrument(skip(self, request), fields(product_id = request.product_id, quantity = request.quantity))]
    pub async fn record_sale(
        &self,
        reseller_id: i64,
        request: RecordSaleRequest,
    ) -> Result<sale::Model, ServiceError> {
        request.validate()?;

        if request.selling_price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "selling price must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        // Guarded decrement; failing the quantity floor means insufficient
        // stock (or a concurrent sale won the race).
        let updated = reseller_stock::Entity::update_many()
            .col_expr(
                reseller_stock::Column::Quantity,
                Expr::col(reseller_stock::Column::Quantity).sub(request.quantity),
            )
            .filter(reseller_stock::Column::ResellerId.eq(reseller_id))
            .filter(reseller_stock::Column::ProductId.eq(request.product_id))
            .filter(reseller_stock::Column::Quantity.gte(request.quantity))
            .exec(&txn)
            .await?;

        if updated.rows_affected != 1 {
            return Err(ServiceError::InsufficientStock(
                "insufficient stock for reseller sale".to_string(),
            ));
        }

        let total_amount = request.selling_price * Decimal::from(request.quantity);
        let date_sold = request.date_sold.unwrap_or_else(|| Utc::now().date_naive());

        let sale = sale::ActiveModel {
            reseller_id: Set(reseller_id),
            product_id: Set(request.product_id),
            quantity: Set(request.quantity),
            selling_price: Set(request.selling_price),
            total_amount: Set(total_amount),
            date_sold: Set(date_sold),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let movement = record_movement(
            &txn,
            NewMovement {
                product_id: request.product_id,
                owner_type: StockOwner::Reseller,
                owner_id: Some(reseller_id),
                movement_type: MovementType::Out,
                quantity: request.quantity,
                unit_price: request.selling_price,
                source: MovementSource::Sale,
                note: "Reseller Sale".to_string(),
            },
        )
        .await?;

        // Consume the reseller's lots oldest-first; the per-lot rows carry
        // the unit cost this sale was fulfilled at.
        let lots = reseller_lot::Entity::find()
            .filter(reseller_lot::Column::ResellerId.eq(reseller_id))
            .filter(reseller_lot::Column::ProductId.eq(request.product_id))
            .filter(reseller_lot::Column::RemainingQuantity.gt(0))
            .order_by_asc(reseller_lot::Column::CreatedAt)
            .order_by_asc(reseller_lot::Column::Id)
            .all(&txn)
            .await?;

        let mut to_deduct = request.quantity;
        for lot in &lots {
            if to_deduct == 0 {
                break;
            }

            let take = lot.remaining_quantity.min(to_deduct);

            let updated = reseller_lot::Entity::update_many()
                .col_expr(
                    reseller_lot::Column::RemainingQuantity,
                    Expr::col(reseller_lot::Column::RemainingQuantity).sub(take),
                )
                .filter(reseller_lot::Column::Id.eq(lot.id))
                .filter(reseller_lot::Column::RemainingQuantity.gte(take))
                .exec(&txn)
                .await?;

            if updated.rows_affected != 1 {
                return Err(ServiceError::Conflict(format!(
                    "lot {} was modified concurrently",
                    lot.batch_number
                )));
            }

            record_movement_batch(
                &txn,
                movement.id,
                StockOwner::Reseller,
                lot.source_batch_id,
                &lot.batch_number,
                take,
                lot.unit_cost,
            )
            .await?;

            to_deduct -= take;
        }

        if to_deduct > 0 {
            return Err(ServiceError::InsufficientStock(
                "insufficient stock for reseller sale".to_string(),
            ));
        }

        txn.commit().await?;

        info!(sale_id = sale.id, "sale recorded");

        if let Err(e) = self
            .event_sender
            .send(Event::SaleRecorded {
                sale_id: sale.id,
                reseller_id,
                product_id: sale.product_id,
                quantity: sale.quantity,
            })
            .await
        {
            warn!(error = %e, "failed to publish sale event");
        }

        Ok(sale)
    }

    pub async fn list_sales(
        &self,
        filter: &SaleFilter,
    ) -> Result<(Vec<SaleResponse>, u64), ServiceError> {
        let mut query = sale::Entity::find()
            .find_also_related(product::Entity)
            .order_by_desc(sale::Column::DateSold)
            .order_by_desc(sale::Column::Id);

        if let Some(reseller_id) = filter.reseller_id {
            query = query.filter(sale::Column::ResellerId.eq(reseller_id));
        }
        if let Some(product_id) = filter.product_id {
            query = query.filter(sale::Column::ProductId.eq(product_id));
        }

        let paginator = query.paginate(&*self.db, filter.page_size.max(1));
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(filter.page.max(1) - 1).await?;

        let reseller_ids: Vec<i64> = rows.iter().map(|(s, _)| s.reseller_id).collect();
        let resellers = user::Entity::find()
            .filter(user::Column::Id.is_in(reseller_ids))
            .all(&*self.db)
            .await?;

        let sales = rows
            .into_iter()
            .map(|(sale, product)| {
                let reseller = resellers
                    .iter()
                    .find(|u| u.id == sale.reseller_id)
                    .map(UserSummary::from);
                SaleResponse {
                    product: product.as_ref().map(ProductSummary::from),
                    user: reseller,
                    sale,
                }
            })
            .collect();

        Ok((sales, total))
    }
}
