use crate::{
    db::DbPool,
    entities::{product, product_batch, stock_movement},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "product name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "unit is required"))]
    pub unit: String,
    #[serde(default)]
    pub low_stock_threshold: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub low_stock_threshold: Option<i32>,
}

/// Compact product projection embedded in other resources.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductSummary {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub unit: String,
    pub low_stock_threshold: i32,
}

impl From<&product::Model> for ProductSummary {
    fn from(p: &product::Model) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            price: p.price,
            unit: p.unit.clone(),
            low_stock_threshold: p.low_stock_threshold,
        }
    }
}

/// Option row for the product select in the dashboard forms.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductFormOption {
    pub id: i64,
    pub name: String,
    pub unit: String,
    pub price: Decimal,
}

#[derive(Debug, Default)]
pub struct ProductFilter {
    pub page: u64,
    pub page_size: u64,
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;

        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price cannot be negative".to_string(),
            ));
        }

        let model = product::ActiveModel {
            name: Set(request.name),
            description: Set(request.description),
            price: Set(request.price),
            category: Set(request.category),
            unit: Set(request.unit),
            low_stock_threshold: Set(request.low_stock_threshold),
            deleted: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = model.id, "product created");

        Ok(model)
    }

    pub async fn get_product(&self, id: i64) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .filter(product::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("product".to_string()))
    }

    #[instrument(skip(self, request), fields(product_id = id))]
    pub async fn update_product(
        &self,
        id: i64,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;

        if matches!(request.price, Some(p) if p < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "price cannot be negative".to_string(),
            ));
        }

        let existing = self.get_product(id).await?;
        let mut active: product::ActiveModel = existing.into();

        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(description);
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(category) = request.category {
            active.category = Set(category);
        }
        if let Some(unit) = request.unit {
            active.unit = Set(unit);
        }
        if let Some(threshold) = request.low_stock_threshold {
            active.low_stock_threshold = Set(threshold);
        }

        Ok(active.update(&*self.db).await?)
    }

    /// Soft-deletes a product. Refused while any batch or ledger entry still
    /// references it.
    #[instrument(skip(self), fields(product_id = id))]
    pub async fn delete_product(&self, id: i64) -> Result<(), ServiceError> {
        let existing = self.get_product(id).await?;

        let batch_refs = product_batch::Entity::find()
            .filter(product_batch::Column::ProductId.eq(id))
            .count(&*self.db)
            .await?;

        let movement_refs = stock_movement::Entity::find()
            .filter(stock_movement::Column::ProductId.eq(id))
            .count(&*self.db)
            .await?;

        if batch_refs > 0 || movement_refs > 0 {
            return Err(ServiceError::ValidationError(
                "product has existing batches or stock movements and cannot be deleted"
                    .to_string(),
            ));
        }

        let mut active: product::ActiveModel = existing.into();
        active.deleted = Set(true);
        active.update(&*self.db).await?;

        info!(product_id = id, "product deleted");

        Ok(())
    }

    pub async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut query = product::Entity::find()
            .filter(product::Column::Deleted.eq(false))
            .order_by_desc(product::Column::CreatedAt);

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

        if let Some(category) = &filter.category {
            query = query.filter(product::Column::Category.eq(category.clone()));
        }

        let paginator = query.paginate(&*self.db, filter.page_size.max(1));
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(filter.page.max(1) - 1).await?;

        Ok((products, total))
    }

    /// Non-deleted products as select options, alphabetical.
    pub async fn form_options(&self) -> Result<Vec<ProductFormOption>, ServiceError> {
        let products = product::Entity::find()
            .filter(product::Column::Deleted.eq(false))
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?;

        Ok(products
            .into_iter()
            .map(|p| ProductFormOption {
                id: p.id,
                name: p.name,
                unit: p.unit,
                price: p.price,
            })
            .collect())
    }
}
