use crate::{
    db::DbPool,
    entities::{
        product, stock_movement, stock_movement_batch,
        stock_movement::{MovementSource, MovementType, StockOwner},
    },
    errors::ServiceError,
    services::catalog::ProductSummary,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// A ledger entry to append. Appended inside the caller's transaction so the
/// movement commits or rolls back together with the quantity change it
/// records.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: i64,
    pub owner_type: StockOwner,
    pub owner_id: Option<i64>,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub source: MovementSource,
    pub note: String,
}

pub async fn record_movement<C: ConnectionTrait>(
    conn: &C,
    movement: NewMovement,
) -> Result<stock_movement::Model, ServiceError> {
    let model = stock_movement::ActiveModel {
        product_id: Set(movement.product_id),
        owner_type: Set(movement.owner_type.to_string()),
        owner_id: Set(movement.owner_id),
        movement_type: Set(movement.movement_type.to_string()),
        quantity: Set(movement.quantity),
        unit_price: Set(movement.unit_price),
        source: Set(movement.source.to_string()),
        note: Set(movement.note),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(model)
}

/// Append the per-batch breakdown row for a movement.
pub async fn record_movement_batch<C: ConnectionTrait>(
    conn: &C,
    stock_movement_id: i64,
    owner: StockOwner,
    batch_id: i64,
    batch_number: &str,
    quantity: i64,
    unit_cost: Decimal,
) -> Result<stock_movement_batch::Model, ServiceError> {
    let model = stock_movement_batch::ActiveModel {
        stock_movement_id: Set(stock_movement_id),
        owner: Set(owner.to_string()),
        batch_id: Set(batch_id),
        batch_number: Set(batch_number.to_string()),
        quantity: Set(quantity),
        unit_cost: Set(unit_cost),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(model)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StockMovementResponse {
    #[serde(flatten)]
    pub movement: stock_movement::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Default)]
pub struct MovementFilter {
    pub page: u64,
    pub page_size: u64,
    pub search: Option<String>,
    pub product_id: Option<i64>,
    pub owner_type: Option<String>,
    pub owner_id: Option<i64>,
    pub movement_type: Option<String>,
    pub source: Option<String>,
}

#[derive(Clone)]
pub struct MovementService {
    db: Arc<DbPool>,
}

impl MovementService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn list_movements(
        &self,
        filter: &MovementFilter,
    ) -> Result<(Vec<StockMovementResponse>, u64), ServiceError> {
        let mut query = stock_movement::Entity::find()
            .find_also_related(product::Entity)
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id);

        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(owner_type) = &filter.owner_type {
            query = query.filter(stock_movement::Column::OwnerType.eq(owner_type.clone()));
        }
        if let Some(owner_id) = filter.owner_id {
            query = query.filter(stock_movement::Column::OwnerId.eq(owner_id));
        }
        if let Some(movement_type) = &filter.movement_type {
            query = query.filter(stock_movement::Column::MovementType.eq(movement_type.clone()));
        }
        if let Some(source) = &filter.source {
            query = query.filter(stock_movement::Column::Source.eq(source.clone()));
        }
        if let Some(search) = &filter.search {
            let needle = format!("%{}%", search.to_lowercase());
            query = query.filter(
                Expr::expr(Func::lower(Expr::col((
                    product::Entity,
                    product::Column::Name,
                ))))
                .like(needle),
            );
        }

        let paginator = query.paginate(&*self.db, filter.page_size.max(1));
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(filter.page.max(1) - 1).await?;

        let movements = rows
            .into_iter()
            .map(|(movement, product)| StockMovementResponse {
                product: product.as_ref().map(ProductSummary::from),
                movement,
            })
            .collect();

        Ok((movements, total))
    }
}
