use crate::{
    db::DbPool,
    entities::{
        alert, product, product_batch,
        stock_movement::{MovementSource, MovementType, StockOwner},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::ProductSummary,
    services::movements::{record_movement, NewMovement},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Condition, Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddBatchRequest {
    pub product_id: i64,
    #[validate(length(min = 1, message = "batch number is required"))]
    pub batch_number: String,
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,
    pub purchase_price: Decimal,
    /// Defaults to today when omitted.
    pub date_received: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchResponse {
    #[serde(flatten)]
    pub batch: product_batch::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
}

/// Derived per-product company stock: the sum of remaining batch quantities.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompanyStockRow {
    pub product_id: i64,
    pub quantity: i64,
    pub product: ProductSummary,
}

#[derive(Debug, Default)]
pub struct BatchFilter {
    pub page: u64,
    pub page_size: u64,
    pub product_id: Option<i64>,
    pub in_stock: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Default)]
pub struct CompanyStockFilter {
    pub page: u64,
    pub page_size: u64,
    pub search: Option<String>,
    pub in_stock: Option<bool>,
}

#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Records a purchased batch: the batch row, the company IN ledger entry
    /// and the activity alert commit atomically.
    #[instrument(skip(self, request), fields(product_id = request.product_id, batch_number = %request.batch_number))]
    pub async fn add_batch(
        &self,
        request: AddBatchRequest,
    ) -> Result<product_batch::Model, ServiceError> {
        request.validate()?;

        if request.purchase_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "purchase price cannot be negative".to_string(),
            ));
        }

        let product = product::Entity::find_by_id(request.product_id)
            .filter(product::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("product".to_string()))?;

        let duplicate = product_batch::Entity::find()
            .filter(product_batch::Column::BatchNumber.eq(request.batch_number.clone()))
            .count(&*self.db)
            .await?;
        if duplicate > 0 {
            return Err(ServiceError::ValidationError(format!(
                "batch number {} already exists",
                request.batch_number
            )));
        }

        let date_received = request
            .date_received
            .unwrap_or_else(|| Utc::now().date_naive());

        let txn = self.db.begin().await?;

        let batch = product_batch::ActiveModel {
            product_id: Set(request.product_id),
            batch_number: Set(request.batch_number.clone()),
            quantity: Set(request.quantity),
            remaining_quantity: Set(request.quantity),
            purchase_price: Set(request.purchase_price),
            date_received: Set(date_received),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        record_movement(
            &txn,
            NewMovement {
                product_id: request.product_id,
                owner_type: StockOwner::Company,
                owner_id: None,
                movement_type: MovementType::In,
                quantity: request.quantity,
                unit_price: request.purchase_price,
                source: MovementSource::Purchase,
                note: request.batch_number.clone(),
            },
        )
        .await?;

        alert::ActiveModel {
            alert_type: Set("STOCK_RECEIVED".to_string()),
            title: Set("Stock Received".to_string()),
            description: Set(format!(
                "{} x{} received as batch {}",
                product.name, request.quantity, request.batch_number
            )),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(batch_id = batch.id, "product batch recorded");

        if let Err(e) = self
            .event_sender
            .send(Event::BatchReceived {
                batch_id: batch.id,
                product_id: batch.product_id,
                quantity: batch.quantity,
            })
            .await
        {
            warn!(error = %e, "failed to publish batch event");
        }

        Ok(batch)
    }

    pub async fn list_batches(
        &self,
        filter: &BatchFilter,
    ) -> Result<(Vec<BatchResponse>, u64), ServiceError> {
        let mut query = product_batch::Entity::find()
            .find_also_related(product::Entity)
            .order_by_desc(product_batch::Column::DateReceived)
            .order_by_desc(product_batch::Column::Id);

        if let Some(product_id) = filter.product_id {
            query = query.filter(product_batch::Column::ProductId.eq(product_id));
        }
        if let Some(true) = filter.in_stock {
            query = query.filter(product_batch::Column::RemainingQuantity.gt(0));
        }
        if let Some(false) = filter.in_stock {
            query = query.filter(product_batch::Column::RemainingQuantity.eq(0));
        }
        if let Some(search) = &filter.search {
            let needle = format!("%{}%", search.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            product_batch::Entity,
                            product_batch::Column::BatchNumber,
                        ))))
                        .like(needle.clone()),
                    )
                    .add(
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

        let batches = rows
            .into_iter()
            .map(|(batch, product)| BatchResponse {
                product: product.as_ref().map(ProductSummary::from),
                batch,
            })
            .collect();

        Ok((batches, total))
    }

    /// Company stock per product, derived from remaining batch quantities so
    /// it can never drift from the batch table.
    pub async fn list_company_stock(
        &self,
        filter: &CompanyStockFilter,
    ) -> Result<(Vec<CompanyStockRow>, u64), ServiceError> {
        let mut product_query = product::Entity::find()
            .filter(product::Column::Deleted.eq(false))
            .order_by_asc(product::Column::Name);

        if let Some(search) = &filter.search {
            let needle = format!("%{}%", search.to_lowercase());
            product_query = product_query.filter(
                Expr::expr(Func::lower(Expr::col((
                    product::Entity,
                    product::Column::Name,
                ))))
                .like(needle),
            );
        }

        let products = product_query.all(&*self.db).await?;

        let batches = product_batch::Entity::find()
            .filter(product_batch::Column::RemainingQuantity.gt(0))
            .all(&*self.db)
            .await?;

        let mut remaining_by_product: HashMap<i64, i64> = HashMap::new();
        for batch in &batches {
            *remaining_by_product.entry(batch.product_id).or_default() +=
                batch.remaining_quantity;
        }

        let mut rows: Vec<CompanyStockRow> = products
            .iter()
            .map(|p| CompanyStockRow {
                product_id: p.id,
                quantity: remaining_by_product.get(&p.id).copied().unwrap_or(0),
                product: ProductSummary::from(p),
            })
            .collect();

        if let Some(in_stock) = filter.in_stock {
            rows.retain(|row| (row.quantity > 0) == in_stock);
        }

        let total = rows.len() as u64;
        let page_size = filter.page_size.max(1) as usize;
        let offset = (filter.page.max(1) as usize - 1) * page_size;
        let rows = rows.into_iter().skip(offset).take(page_size).collect();

        Ok((rows, total))
    }
}
