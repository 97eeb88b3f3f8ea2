use crate::{
    db::DbPool,
    entities::{
        alert, product, product_batch, reseller_lot, reseller_stock, stock_distribution,
        stock_movement::{MovementSource, MovementType, StockOwner},
        user,
        user::UserRole,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::ProductSummary,
    services::movements::{record_movement, record_movement_batch, NewMovement},
    services::users::UserSummary,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Condition, Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DistributeStockRequest {
    pub reseller_id: i64,
    pub product_id: i64,
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,
    pub unit_price: Decimal,
    /// Defaults to today when omitted.
    pub date_distributed: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DistributionResponse {
    #[serde(flatten)]
    pub distribution: stock_distribution::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

#[derive(Debug, Default)]
pub struct DistributionFilter {
    pub page: u64,
    pub page_size: u64,
    pub reseller_id: Option<i64>,
    pub product_id: Option<i64>,
    pub search: Option<String>,
}

/// Computes which batches a distribution consumes and how much from each,
/// oldest first. `batches` must already be ordered by receipt date then id.
/// Returns `(batch_index, take)` pairs, or the shortfall if the batches
/// cannot cover the request.
pub fn plan_fifo_consumption(
    remaining: &[i64],
    requested: i64,
) -> Result<Vec<(usize, i64)>, i64> {
    let available: i64 = remaining.iter().sum();
    if available < requested {
        return Err(requested - available);
    }

    let mut takes = Vec::new();
    let mut to_issue = requested;
    for (idx, &qty) in remaining.iter().enumerate() {
        if to_issue == 0 {
            break;
        }
        if qty <= 0 {
            continue;
        }
        let take = qty.min(to_issue);
        takes.push((idx, take));
        to_issue -= take;
    }

    Ok(takes)
}

/// Core distribution step, run inside the caller's transaction so goods
/// request approval can bundle several distributions into one atomic commit.
///
/// Consumes company batches oldest-first, fans the consumed lots out to the
/// reseller with their unit costs, appends the paired ledger entries and the
/// distribution record. Any failure leaves the transaction poisoned and
/// nothing persists.
pub async fn distribute_in_txn<C: ConnectionTrait>(
    txn: &C,
    request: &DistributeStockRequest,
) -> Result<stock_distribution::Model, ServiceError> {
    if request.quantity <= 0 {
        return Err(ServiceError::ValidationError(
            "quantity must be positive".to_string(),
        ));
    }
    if request.unit_price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "unit price cannot be negative".to_string(),
        ));
    }

    let reseller = user::Entity::find_by_id(request.reseller_id)
        .filter(user::Column::Deleted.eq(false))
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("reseller".to_string()))?;

    if reseller.role != UserRole::Staff.to_string() {
        return Err(ServiceError::ValidationError(
            "stock can only be distributed to resellers".to_string(),
        ));
    }

    product::Entity::find_by_id(request.product_id)
        .filter(product::Column::Deleted.eq(false))
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("product".to_string()))?;

    // Oldest receipt first, id ascending for a deterministic tie-break.
    let batches = product_batch::Entity::find()
        .filter(product_batch::Column::ProductId.eq(request.product_id))
        .filter(product_batch::Column::RemainingQuantity.gt(0))
        .order_by_asc(product_batch::Column::DateReceived)
        .order_by_asc(product_batch::Column::Id)
        .all(txn)
        .await?;

    let remaining: Vec<i64> = batches.iter().map(|b| b.remaining_quantity).collect();
    let takes = plan_fifo_consumption(&remaining, request.quantity).map_err(|_| {
        ServiceError::InsufficientStock(
            "insufficient stock available for distribution".to_string(),
        )
    })?;

    let total_price = request.unit_price * Decimal::from(request.quantity);

    let company_out = record_movement(
        txn,
        NewMovement {
            product_id: request.product_id,
            owner_type: StockOwner::Company,
            owner_id: None,
            movement_type: MovementType::Out,
            quantity: request.quantity,
            unit_price: request.unit_price,
            source: MovementSource::Distribution,
            note: format!("Distributed to: {}", reseller.name),
        },
    )
    .await?;

    for (idx, take) in takes {
        let batch = &batches[idx];

        // Guarded decrement: losing a race to another distribution leaves the
        // row short and aborts the whole transaction.
        let updated = product_batch::Entity::update_many()
            .col_expr(
                product_batch::Column::RemainingQuantity,
                Expr::col(product_batch::Column::RemainingQuantity).sub(take),
            )
            .filter(product_batch::Column::Id.eq(batch.id))
            .filter(product_batch::Column::RemainingQuantity.gte(take))
            .exec(txn)
            .await?;

        if updated.rows_affected != 1 {
            return Err(ServiceError::Conflict(format!(
                "batch {} was modified concurrently",
                batch.batch_number
            )));
        }

        record_movement_batch(
            txn,
            company_out.id,
            StockOwner::Company,
            batch.id,
            &batch.batch_number,
            take,
            batch.purchase_price,
        )
        .await?;

        reseller_lot::ActiveModel {
            reseller_id: Set(request.reseller_id),
            product_id: Set(request.product_id),
            source_batch_id: Set(batch.id),
            batch_number: Set(batch.batch_number.clone()),
            remaining_quantity: Set(take),
            unit_cost: Set(batch.purchase_price),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(txn)
        .await?;
    }

    let date_distributed = request
        .date_distributed
        .unwrap_or_else(|| Utc::now().date_naive());

    let distribution = stock_distribution::ActiveModel {
        reseller_id: Set(request.reseller_id),
        product_id: Set(request.product_id),
        quantity: Set(request.quantity),
        unit_price: Set(request.unit_price),
        total_price: Set(total_price),
        date_distributed: Set(date_distributed),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    record_movement(
        txn,
        NewMovement {
            product_id: request.product_id,
            owner_type: StockOwner::Reseller,
            owner_id: Some(request.reseller_id),
            movement_type: MovementType::In,
            quantity: request.quantity,
            unit_price: request.unit_price,
            source: MovementSource::Distribution,
            note: format!("{} received products worth: {}", reseller.name, total_price),
        },
    )
    .await?;

    // Upsert the reseller's on-hand quantity.
    let existing = reseller_stock::Entity::find_by_id((request.reseller_id, request.product_id))
        .one(txn)
        .await?;

    match existing {
        Some(_) => {
            reseller_stock::Entity::update_many()
                .col_expr(
                    reseller_stock::Column::Quantity,
                    Expr::col(reseller_stock::Column::Quantity).add(request.quantity),
                )
                .filter(reseller_stock::Column::ResellerId.eq(request.reseller_id))
                .filter(reseller_stock::Column::ProductId.eq(request.product_id))
                .exec(txn)
                .await?;
        }
        None => {
            reseller_stock::ActiveModel {
                reseller_id: Set(request.reseller_id),
                product_id: Set(request.product_id),
                quantity: Set(request.quantity),
                low_stock_threshold: Set(0),
            }
            .insert(txn)
            .await?;
        }
    }

    alert::ActiveModel {
        alert_type: Set("STOCK_DISTRIBUTED".to_string()),
        title: Set("Stock Distributed".to_string()),
        description: Set(format!(
            "{} units distributed to {}",
            request.quantity, reseller.name
        )),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    Ok(distribution)
}

#[derive(Clone)]
pub struct DistributionService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl DistributionService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Distributes stock to a reseller as a single atomic transaction.
    #[instrument(skip(self, request), fields(reseller_id = request.reseller_id, product_id = request.product_id, quantity = request.quantity))]
    pub async fn distribute(
        &self,
        request: DistributeStockRequest,
    ) -> Result<stock_distribution::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;
        let distribution = distribute_in_txn(&txn, &request).await?;
        txn.commit().await?;

        info!(distribution_id = distribution.id, "stock distributed");

        if let Err(e) = self
            .event_sender
            .send(Event::StockDistributed {
                distribution_id: distribution.id,
                reseller_id: distribution.reseller_id,
                product_id: distribution.product_id,
                quantity: distribution.quantity,
            })
            .await
        {
            warn!(error = %e, "failed to publish distribution event");
        }

        Ok(distribution)
    }

    pub async fn list_distributions(
        &self,
        filter: &DistributionFilter,
    ) -> Result<(Vec<DistributionResponse>, u64), ServiceError> {
        let mut query = stock_distribution::Entity::find()
            .find_also_related(product::Entity)
            .order_by_desc(stock_distribution::Column::DateDistributed)
            .order_by_desc(stock_distribution::Column::Id);

        if let Some(reseller_id) = filter.reseller_id {
            query = query.filter(stock_distribution::Column::ResellerId.eq(reseller_id));
        }
        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_distribution::Column::ProductId.eq(product_id));
        }
        if let Some(search) = &filter.search {
            let needle = format!("%{}%", search.to_lowercase());
            query = query.filter(
                Condition::any().add(
                    Expr::expr(Func::lower(Expr::col((
                        product::Entity,
                        product::Column::Name,
                    ))))
                    .like(needle),
                ),
            );
        }

        let paginator = query.paginate(&*self.db, filter.page_size.max(1));
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(filter.page.max(1) - 1).await?;

        // Attach reseller summaries in one lookup.
        let reseller_ids: Vec<i64> = rows
            .iter()
            .map(|(d, _)| d.reseller_id)
            .collect();
        let resellers = user::Entity::find()
            .filter(user::Column::Id.is_in(reseller_ids))
            .all(&*self.db)
            .await?;

        let distributions = rows
            .into_iter()
            .map(|(distribution, product)| {
                let reseller = resellers
                    .iter()
                    .find(|u| u.id == distribution.reseller_id)
                    .map(UserSummary::from);
                DistributionResponse {
                    product: product.as_ref().map(ProductSummary::from),
                    user: reseller,
                    distribution,
                }
            })
            .collect();

        Ok((distributions, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fifo_takes_oldest_first() {
        // Worked example: B1 remaining 30 (older), B2 remaining 20.
        let takes = plan_fifo_consumption(&[30, 20], 35).expect("plan");
        assert_eq!(takes, vec![(0, 30), (1, 5)]);
    }

    #[test]
    fn fifo_skips_empty_batches() {
        let takes = plan_fifo_consumption(&[0, 10, 0, 5], 12).expect("plan");
        assert_eq!(takes, vec![(1, 10), (3, 2)]);
    }

    #[test]
    fn fifo_reports_shortfall() {
        assert_eq!(plan_fifo_consumption(&[3, 4], 10), Err(3));
        assert_eq!(plan_fifo_consumption(&[], 1), Err(1));
    }

    proptest! {
        #[test]
        fn fifo_plan_conserves_quantity(
            remaining in proptest::collection::vec(0i64..500, 0..12),
            requested in 1i64..1000,
        ) {
            match plan_fifo_consumption(&remaining, requested) {
                Ok(takes) => {
                    // Issued exactly what was requested.
                    let issued: i64 = takes.iter().map(|(_, take)| take).sum();
                    prop_assert_eq!(issued, requested);

                    // Never overdraws a batch, never touches an empty one.
                    for &(idx, take) in &takes {
                        prop_assert!(take > 0);
                        prop_assert!(take <= remaining[idx]);
                    }

                    // Strictly ordered: a batch is only touched once, in order.
                    let indices: Vec<usize> = takes.iter().map(|(idx, _)| *idx).collect();
                    let mut sorted = indices.clone();
                    sorted.sort_unstable();
                    sorted.dedup();
                    prop_assert_eq!(&indices, &sorted);

                    // Every batch before the last consumed one is drained.
                    if let Some(&(last, _)) = takes.last() {
                        for &(idx, take) in takes.iter().filter(|(idx, _)| *idx < last) {
                            prop_assert_eq!(take, remaining[idx]);
                        }
                    }
                }
                Err(shortfall) => {
                    let available: i64 = remaining.iter().sum();
                    prop_assert_eq!(shortfall, requested - available);
                    prop_assert!(available < requested);
                }
            }
        }
    }
}
