use crate::{
    db::DbPool,
    entities::{
        payment, product, reseller_stock, sale, stock_distribution, stock_movement,
        stock_movement::{MovementSource, StockOwner},
        stock_movement_batch, user,
        user::UserRole,
    },
    errors::ServiceError,
    services::catalog::ProductSummary,
    services::users::UserSummary,
};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResellerStockResponse {
    #[serde(flatten)]
    pub stock: reseller_stock::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateStockThresholdRequest {
    pub product_id: i64,
    #[validate(range(min = 0, message = "threshold cannot be negative"))]
    pub low_stock_threshold: i32,
}

/// Derived financial position of a reseller. The balance owed to the company
/// is the value of goods received minus payments made; sales proceeds belong
/// to the reseller and never enter the balance.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResellerAccount {
    pub reseller_id: i64,
    pub total_stock_received: i64,
    pub total_value_received: Decimal,
    pub total_sales_value: Decimal,
    pub total_cogs: Decimal,
    pub total_paid: Decimal,
    pub balance: Decimal,
}

/// Reseller row for the admin listing, with the account rolled in.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResellerOverview {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub total_value_received: Decimal,
    pub total_sales_value: Decimal,
    pub total_paid: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Default)]
pub struct ResellerStockFilter {
    pub page: u64,
    pub page_size: u64,
    pub reseller_id: Option<i64>,
    pub search: Option<String>,
    pub in_stock: Option<bool>,
}

#[derive(Clone)]
pub struct ResellerService {
    db: Arc<DbPool>,
}

impl ResellerService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn list_stock(
        &self,
        filter: &ResellerStockFilter,
    ) -> Result<(Vec<ResellerStockResponse>, u64), ServiceError> {
        let mut query = reseller_stock::Entity::find()
            .find_also_related(product::Entity)
            .order_by_asc(reseller_stock::Column::ProductId);

        if let Some(reseller_id) = filter.reseller_id {
            query = query.filter(reseller_stock::Column::ResellerId.eq(reseller_id));
        }
        if let Some(true) = filter.in_stock {
            query = query.filter(reseller_stock::Column::Quantity.gt(0));
        }
        if let Some(false) = filter.in_stock {
            query = query.filter(reseller_stock::Column::Quantity.eq(0));
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

        let stock = rows
            .into_iter()
            .map(|(stock, product)| ResellerStockResponse {
                product: product.as_ref().map(ProductSummary::from),
                stock,
            })
            .collect();

        Ok((stock, total))
    }

    /// Updates the low-stock threshold on one of the reseller's stock rows.
    #[instrument(skip(self, request), fields(product_id = request.product_id))]
    pub async fn update_stock_threshold(
        &self,
        reseller_id: i64,
        request: UpdateStockThresholdRequest,
    ) -> Result<reseller_stock::Model, ServiceError> {
        request.validate()?;

        let stock = reseller_stock::Entity::find_by_id((reseller_id, request.product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("reseller stock".to_string()))?;

        let mut active: reseller_stock::ActiveModel = stock.into();
        active.low_stock_threshold = Set(request.low_stock_threshold);

        Ok(active.update(&*self.db).await?)
    }

    /// Computes the reseller's account from the distribution, sale, payment
    /// and ledger tables. Nothing is materialized, so the balance identity
    /// holds for every history by construction.
    pub async fn account(&self, reseller_id: i64) -> Result<ResellerAccount, ServiceError> {
        user::Entity::find_by_id(reseller_id)
            .filter(user::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("reseller".to_string()))?;

        let distributions = stock_distribution::Entity::find()
            .filter(stock_distribution::Column::ResellerId.eq(reseller_id))
            .all(&*self.db)
            .await?;

        let total_stock_received: i64 = distributions.iter().map(|d| d.quantity).sum();
        let total_value_received: Decimal = distributions.iter().map(|d| d.total_price).sum();

        let sales = sale::Entity::find()
            .filter(sale::Column::ResellerId.eq(reseller_id))
            .all(&*self.db)
            .await?;
        let total_sales_value: Decimal = sales.iter().map(|s| s.total_amount).sum();

        let payments = payment::Entity::find()
            .filter(payment::Column::ResellerId.eq(reseller_id))
            .all(&*self.db)
            .await?;
        let total_paid: Decimal = payments.iter().map(|p| p.amount).sum();

        let total_cogs = self.total_cogs(reseller_id).await?;

        Ok(ResellerAccount {
            reseller_id,
            total_stock_received,
            total_value_received,
            total_sales_value,
            total_cogs,
            total_paid,
            balance: total_value_received - total_paid,
        })
    }

    /// Cost of goods sold, derived from the per-batch breakdown rows of the
    /// reseller's SALE movements.
    async fn total_cogs(&self, reseller_id: i64) -> Result<Decimal, ServiceError> {
        let sale_movements = stock_movement::Entity::find()
            .filter(stock_movement::Column::OwnerType.eq(StockOwner::Reseller.to_string()))
            .filter(stock_movement::Column::OwnerId.eq(reseller_id))
            .filter(stock_movement::Column::Source.eq(MovementSource::Sale.to_string()))
            .all(&*self.db)
            .await?;

        if sale_movements.is_empty() {
            return Ok(Decimal::ZERO);
        }

        let movement_ids: Vec<i64> = sale_movements.iter().map(|m| m.id).collect();
        let batch_rows = stock_movement_batch::Entity::find()
            .filter(stock_movement_batch::Column::StockMovementId.is_in(movement_ids))
            .all(&*self.db)
            .await?;

        Ok(batch_rows
            .iter()
            .map(|row| row.unit_cost * Decimal::from(row.quantity))
            .sum())
    }

    /// Admin listing of resellers with their account positions.
    pub async fn list_resellers(
        &self,
        page: u64,
        page_size: u64,
        search: Option<&str>,
    ) -> Result<(Vec<ResellerOverview>, u64), ServiceError> {
        let mut query = user::Entity::find()
            .filter(user::Column::Deleted.eq(false))
            .filter(user::Column::Role.eq(UserRole::Staff.to_string()))
            .order_by_asc(user::Column::Name);

        if let Some(search) = search {
            let needle = format!("%{}%", search.to_lowercase());
            query = query.filter(
                Expr::expr(Func::lower(Expr::col((user::Entity, user::Column::Name))))
                    .like(needle),
            );
        }

        let paginator = query.paginate(&*self.db, page_size.max(1));
        let total = paginator.num_items().await?;
        let resellers = paginator.fetch_page(page.max(1) - 1).await?;

        let mut overviews = Vec::with_capacity(resellers.len());
        for reseller in resellers {
            let account = self.account(reseller.id).await?;
            overviews.push(ResellerOverview {
                id: reseller.id,
                name: reseller.name,
                email: reseller.email,
                phone_number: reseller.phone_number,
                total_value_received: account.total_value_received,
                total_sales_value: account.total_sales_value,
                total_paid: account.total_paid,
                balance: account.balance,
            });
        }

        Ok((overviews, total))
    }

    pub async fn get_reseller(&self, id: i64) -> Result<UserSummary, ServiceError> {
        let reseller = user::Entity::find_by_id(id)
            .filter(user::Column::Deleted.eq(false))
            .filter(user::Column::Role.eq(UserRole::Staff.to_string()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("reseller".to_string()))?;

        Ok(UserSummary::from(&reseller))
    }

    /// Stock rows for the reseller's threshold form.
    pub async fn stock_form_options(
        &self,
        reseller_id: i64,
    ) -> Result<Vec<serde_json::Value>, ServiceError> {
        let rows = reseller_stock::Entity::find()
            .find_also_related(product::Entity)
            .filter(reseller_stock::Column::ResellerId.eq(reseller_id))
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(stock, product)| {
                serde_json::json!({
                    "id": stock.product_id,
                    "name": product.map(|p| p.name).unwrap_or_default(),
                    "quantity": stock.quantity,
                    "low_stock_threshold": stock.low_stock_threshold,
                })
            })
            .collect())
    }
}
