use crate::{
    db::DbPool,
    entities::{
        alert, goods_request,
        goods_request::GoodsRequestStatus,
        payment,
        payment::PaymentMethod,
        product, product_batch, reseller_stock, sale, stock_distribution, stock_movement,
        stock_movement::{MovementSource, MovementType, StockOwner},
        user,
        user::UserRole,
    },
    errors::ServiceError,
    services::resellers::ResellerService,
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Serialize)]
struct StockAlertRow {
    id: i64,
    product_name: String,
    quantity: i64,
    low_stock_threshold: i32,
    alert_type: &'static str,
}

#[derive(Debug, Serialize)]
struct TopResellerRow {
    id: i64,
    name: String,
    total_sales_value: Decimal,
    stock_value: Decimal,
    performance: f64,
}

#[derive(Debug, Serialize)]
struct ChartPoint {
    date: NaiveDate,
    in_stock: i64,
    distributed: i64,
}

/// Read-only page aggregates. Every figure is recomputed from the ledger and
/// entity tables on request; nothing here writes.
#[derive(Clone)]
pub struct StatsService {
    db: Arc<DbPool>,
    resellers: ResellerService,
}

impl StatsService {
    pub fn new(db: Arc<DbPool>, resellers: ResellerService) -> Self {
        Self { db, resellers }
    }

    #[instrument(skip(self))]
    pub async fn admin_page_data(&self, page: &str) -> Result<Value, ServiceError> {
        match page {
            "dashboard" => self.admin_dashboard().await,
            "products" => self.admin_products().await,
            "batches" => self.admin_batches().await,
            "distributions" => self.admin_distributions().await,
            "goods_requests" => self.goods_request_counts(None).await,
            "payments" => self.payment_totals(None).await,
            "resellers" => self.admin_resellers().await,
            "stock_movements" => self.admin_stock_movements().await,
            _ => Err(ServiceError::ValidationError(format!(
                "unknown page: {page}"
            ))),
        }
    }

    #[instrument(skip(self))]
    pub async fn reseller_page_data(
        &self,
        reseller_id: i64,
        page: &str,
    ) -> Result<Value, ServiceError> {
        match page {
            "dashboard" => self.reseller_dashboard(reseller_id).await,
            "stock" => self.reseller_stock(reseller_id).await,
            "sales" => self.reseller_sales(reseller_id).await,
            "goods_requests" => self.goods_request_counts(Some(reseller_id)).await,
            "payments" => self.payment_totals(Some(reseller_id)).await,
            "account_summary" => {
                let account = self.resellers.account(reseller_id).await?;
                serde_json::to_value(account).map_err(|e| ServiceError::InternalError(e.to_string()))
            }
            _ => Err(ServiceError::ValidationError(format!(
                "unknown page: {page}"
            ))),
        }
    }

    /// Remaining company quantity per non-deleted product.
    async fn company_quantities(&self) -> Result<Vec<(product::Model, i64)>, ServiceError> {
        let products = product::Entity::find()
            .filter(product::Column::Deleted.eq(false))
            .all(&*self.db)
            .await?;

        let batches = product_batch::Entity::find()
            .filter(product_batch::Column::RemainingQuantity.gt(0))
            .all(&*self.db)
            .await?;

        let mut by_product: HashMap<i64, i64> = HashMap::new();
        for batch in &batches {
            *by_product.entry(batch.product_id).or_default() += batch.remaining_quantity;
        }

        Ok(products
            .into_iter()
            .map(|p| {
                let qty = by_product.get(&p.id).copied().unwrap_or(0);
                (p, qty)
            })
            .collect())
    }

    async fn admin_dashboard(&self) -> Result<Value, ServiceError> {
        let quantities = self.company_quantities().await?;
        let total_company_stock: i64 = quantities.iter().map(|(_, q)| q).sum();

        let distributions = stock_distribution::Entity::find().all(&*self.db).await?;
        let stock_distributed_units: i64 = distributions.iter().map(|d| d.quantity).sum();
        let total_value_distributed: Decimal = distributions.iter().map(|d| d.total_price).sum();

        let payments = payment::Entity::find().all(&*self.db).await?;
        let payment_received: Decimal = payments.iter().map(|p| p.amount).sum();

        let active_resellers = user::Entity::find()
            .filter(user::Column::Deleted.eq(false))
            .filter(user::Column::Role.eq(UserRole::Staff.to_string()))
            .count(&*self.db)
            .await?;

        let total_pending_requests = goods_request::Entity::find()
            .filter(goods_request::Column::Status.eq(GoodsRequestStatus::Pending.to_string()))
            .filter(goods_request::Column::Cancelled.eq(false))
            .count(&*self.db)
            .await?;

        let stock_alerts: Vec<StockAlertRow> = quantities
            .iter()
            .filter(|(p, qty)| *qty <= p.low_stock_threshold as i64)
            .map(|(p, qty)| StockAlertRow {
                id: p.id,
                product_name: p.name.clone(),
                quantity: *qty,
                low_stock_threshold: p.low_stock_threshold,
                alert_type: if *qty == 0 { "OUT_OF_STOCK" } else { "LOW_STOCK" },
            })
            .collect();
        let company_low_stock = stock_alerts.len();

        let recent_activities = alert::Entity::find()
            .order_by_desc(alert::Column::CreatedAt)
            .order_by_desc(alert::Column::Id)
            .limit(10)
            .all(&*self.db)
            .await?;
        let recent_activities: Vec<Value> = recent_activities
            .into_iter()
            .map(|a| {
                json!({
                    "id": a.id,
                    "title": a.title,
                    "description": a.description,
                    "type": a.alert_type,
                    "created_at": a.created_at,
                })
            })
            .collect();

        let top_resellers = self.top_resellers().await?;
        let weekly_stock_chart = self.weekly_stock_chart().await?;

        Ok(json!({
            "total_company_stock": total_company_stock,
            "stock_distributed_units": stock_distributed_units,
            "total_value_distributed": total_value_distributed,
            "payment_received": payment_received,
            "active_resellers": active_resellers,
            "total_pending_requests": total_pending_requests,
            "company_low_stock": company_low_stock,
            "stock_alerts": stock_alerts,
            "recent_activities": recent_activities,
            "top_resellers": top_resellers,
            "weekly_stock_chart": weekly_stock_chart,
        }))
    }

    async fn top_resellers(&self) -> Result<Vec<TopResellerRow>, ServiceError> {
        let resellers = user::Entity::find()
            .filter(user::Column::Deleted.eq(false))
            .filter(user::Column::Role.eq(UserRole::Staff.to_string()))
            .all(&*self.db)
            .await?;

        let sales = sale::Entity::find().all(&*self.db).await?;
        let mut sales_by_reseller: HashMap<i64, Decimal> = HashMap::new();
        for s in &sales {
            *sales_by_reseller.entry(s.reseller_id).or_default() += s.total_amount;
        }
        let overall_sales: Decimal = sales.iter().map(|s| s.total_amount).sum();

        let stock = reseller_stock::Entity::find().all(&*self.db).await?;
        let products = product::Entity::find().all(&*self.db).await?;
        let price_of: HashMap<i64, Decimal> = products.iter().map(|p| (p.id, p.price)).collect();

        let mut stock_value_by_reseller: HashMap<i64, Decimal> = HashMap::new();
        for row in &stock {
            let value = price_of.get(&row.product_id).copied().unwrap_or(Decimal::ZERO)
                * Decimal::from(row.quantity);
            *stock_value_by_reseller.entry(row.reseller_id).or_default() += value;
        }

        let mut rows: Vec<TopResellerRow> = resellers
            .into_iter()
            .map(|r| {
                let total_sales_value = sales_by_reseller
                    .get(&r.id)
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                let performance = if overall_sales.is_zero() {
                    0.0
                } else {
                    let share = total_sales_value / overall_sales * Decimal::from(100);
                    share.to_f64().unwrap_or(0.0)
                };
                TopResellerRow {
                    id: r.id,
                    name: r.name,
                    total_sales_value,
                    stock_value: stock_value_by_reseller
                        .get(&r.id)
                        .copied()
                        .unwrap_or(Decimal::ZERO),
                    performance,
                }
            })
            .collect();

        rows.sort_by(|a, b| b.total_sales_value.cmp(&a.total_sales_value));
        rows.truncate(5);

        Ok(rows)
    }

    /// Company IN vs distributed OUT units per day over the last seven days.
    async fn weekly_stock_chart(&self) -> Result<Vec<ChartPoint>, ServiceError> {
        let today = Utc::now().date_naive();
        let window_start = today - Duration::days(6);

        let movements = stock_movement::Entity::find()
            .filter(stock_movement::Column::OwnerType.eq(StockOwner::Company.to_string()))
            .all(&*self.db)
            .await?;

        let mut buckets: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
        for offset in 0..7 {
            buckets.insert(window_start + Duration::days(offset), (0, 0));
        }

        for movement in &movements {
            let day = movement.created_at.date_naive();
            if let Some((in_stock, distributed)) = buckets.get_mut(&day) {
                if movement.movement_type == MovementType::In.to_string() {
                    *in_stock += movement.quantity;
                } else if movement.source == MovementSource::Distribution.to_string() {
                    *distributed += movement.quantity;
                }
            }
        }

        Ok(buckets
            .into_iter()
            .map(|(date, (in_stock, distributed))| ChartPoint {
                date,
                in_stock,
                distributed,
            })
            .collect())
    }

    async fn admin_products(&self) -> Result<Value, ServiceError> {
        let quantities = self.company_quantities().await?;

        let total_units: i64 = quantities.iter().map(|(_, q)| q).sum();
        let out_of_stock = quantities.iter().filter(|(_, q)| *q == 0).count();
        let low_stock_items = quantities
            .iter()
            .filter(|(p, q)| *q > 0 && *q <= p.low_stock_threshold as i64)
            .count();

        Ok(json!({
            "total_units": total_units,
            "low_stock_items": low_stock_items,
            "out_of_stock": out_of_stock,
        }))
    }

    async fn admin_batches(&self) -> Result<Value, ServiceError> {
        let batches = product_batch::Entity::find().all(&*self.db).await?;

        let total_batches = batches.len();
        let active_batches = batches
            .iter()
            .filter(|b| b.remaining_quantity > 0)
            .count();
        let total_value: Decimal = batches
            .iter()
            .map(|b| b.purchase_price * Decimal::from(b.quantity))
            .sum();
        let remaining_value: Decimal = batches
            .iter()
            .map(|b| b.purchase_price * Decimal::from(b.remaining_quantity))
            .sum();

        Ok(json!({
            "total_batches": total_batches,
            "active_batches": active_batches,
            "total_value": total_value,
            "remaining_value": remaining_value,
        }))
    }

    async fn admin_distributions(&self) -> Result<Value, ServiceError> {
        let distributions = stock_distribution::Entity::find().all(&*self.db).await?;

        let total_distribution = distributions.len();
        let units_distributed: i64 = distributions.iter().map(|d| d.quantity).sum();
        let total_value: Decimal = distributions.iter().map(|d| d.total_price).sum();
        let active_resellers = distributions
            .iter()
            .map(|d| d.reseller_id)
            .collect::<HashSet<_>>()
            .len();

        Ok(json!({
            "total_distribution": total_distribution,
            "units_distributed": units_distributed,
            "total_value": total_value,
            "active_resellers": active_resellers,
        }))
    }

    async fn goods_request_counts(&self, reseller_id: Option<i64>) -> Result<Value, ServiceError> {
        let mut query = goods_request::Entity::find();
        if let Some(reseller_id) = reseller_id {
            query = query.filter(goods_request::Column::ResellerId.eq(reseller_id));
        }
        let requests = query.all(&*self.db).await?;

        let total = requests.len();
        let cancelled = requests.iter().filter(|r| r.cancelled).count();
        let count_status = |status: GoodsRequestStatus| {
            requests
                .iter()
                .filter(|r| !r.cancelled && r.status == status.to_string())
                .count()
        };

        // Reseller pages key these differently from the admin page.
        if reseller_id.is_some() {
            Ok(json!({
                "total_requests": total,
                "pending_requests": count_status(GoodsRequestStatus::Pending),
                "approved_requests": count_status(GoodsRequestStatus::Approved),
                "rejected_requests": count_status(GoodsRequestStatus::Rejected),
            }))
        } else {
            Ok(json!({
                "total_pending": count_status(GoodsRequestStatus::Pending),
                "total_approved": count_status(GoodsRequestStatus::Approved),
                "total_rejected": count_status(GoodsRequestStatus::Rejected),
                "total_cancelled": cancelled,
            }))
        }
    }

    async fn payment_totals(&self, reseller_id: Option<i64>) -> Result<Value, ServiceError> {
        let mut query = payment::Entity::find();
        if let Some(reseller_id) = reseller_id {
            query = query.filter(payment::Column::ResellerId.eq(reseller_id));
        }
        let payments = query.all(&*self.db).await?;

        let total_received: Decimal = payments.iter().map(|p| p.amount).sum();
        let cash_total: Decimal = payments
            .iter()
            .filter(|p| p.method == PaymentMethod::Cash.to_string())
            .map(|p| p.amount)
            .sum();
        let mpesa_total: Decimal = payments
            .iter()
            .filter(|p| p.method == PaymentMethod::Mpesa.to_string())
            .map(|p| p.amount)
            .sum();

        Ok(json!({
            "total_payments": payments.len(),
            "total_received": total_received,
            "cash_total": cash_total,
            "mpesa_total": mpesa_total,
        }))
    }

    async fn admin_resellers(&self) -> Result<Value, ServiceError> {
        let resellers = user::Entity::find()
            .filter(user::Column::Deleted.eq(false))
            .filter(user::Column::Role.eq(UserRole::Staff.to_string()))
            .all(&*self.db)
            .await?;
        let total_resellers = resellers.len();

        let distributions = stock_distribution::Entity::find().all(&*self.db).await?;
        let active: HashSet<i64> = distributions.iter().map(|d| d.reseller_id).collect();
        let total_stock_out: i64 = distributions.iter().map(|d| d.quantity).sum();

        let mut outstanding_payments = Decimal::ZERO;
        for reseller in &resellers {
            let account = self.resellers.account(reseller.id).await?;
            outstanding_payments += account.balance;
        }

        Ok(json!({
            "total_resellers": total_resellers,
            "active_resellers": active.len(),
            "total_stock_out": total_stock_out,
            "outstanding_payments": outstanding_payments,
        }))
    }

    async fn admin_stock_movements(&self) -> Result<Value, ServiceError> {
        let movements = stock_movement::Entity::find().all(&*self.db).await?;

        let total_stock_in: i64 = movements
            .iter()
            .filter(|m| m.movement_type == MovementType::In.to_string())
            .map(|m| m.quantity)
            .sum();
        let total_stock_out: i64 = movements
            .iter()
            .filter(|m| m.movement_type == MovementType::Out.to_string())
            .map(|m| m.quantity)
            .sum();

        Ok(json!({
            "total_movements": movements.len(),
            "total_stock_in": total_stock_in,
            "total_stock_out": total_stock_out,
            "net_movement": total_stock_in - total_stock_out,
        }))
    }

    async fn reseller_dashboard(&self, reseller_id: i64) -> Result<Value, ServiceError> {
        let account = self.resellers.account(reseller_id).await?;

        let stock = reseller_stock::Entity::find()
            .filter(reseller_stock::Column::ResellerId.eq(reseller_id))
            .all(&*self.db)
            .await?;
        let current_stock: i64 = stock.iter().map(|s| s.quantity).sum();

        let products = product::Entity::find().all(&*self.db).await?;
        let name_of: HashMap<i64, &str> =
            products.iter().map(|p| (p.id, p.name.as_str())).collect();

        let stock_overview: Vec<Value> = stock
            .iter()
            .map(|s| {
                json!({
                    "id": s.product_id,
                    "name": name_of.get(&s.product_id).copied().unwrap_or_default(),
                    "quantity": s.quantity,
                    "low_stock_threshold": s.low_stock_threshold,
                })
            })
            .collect();

        let sales = sale::Entity::find()
            .filter(sale::Column::ResellerId.eq(reseller_id))
            .order_by_desc(sale::Column::DateSold)
            .order_by_desc(sale::Column::Id)
            .all(&*self.db)
            .await?;

        let units_sold: i64 = sales.iter().map(|s| s.quantity).sum();
        let recent_sales: Vec<Value> = sales
            .iter()
            .take(5)
            .map(|s| {
                json!({
                    "id": s.id,
                    "product_name": name_of.get(&s.product_id).copied().unwrap_or_default(),
                    "quantity": s.quantity,
                    "selling_price": s.selling_price,
                    "total_amount": s.total_amount,
                    "date_sold": s.date_sold,
                })
            })
            .collect();

        Ok(json!({
            "current_stock": current_stock,
            "outstanding_balance": account.balance,
            "profit": account.total_sales_value - account.total_cogs,
            "total_sales": {
                "sales_value": account.total_sales_value,
                "units_sold": units_sold,
            },
            "recent_sales": recent_sales,
            "stock_overview": stock_overview,
        }))
    }

    async fn reseller_stock(&self, reseller_id: i64) -> Result<Value, ServiceError> {
        let stock = reseller_stock::Entity::find()
            .filter(reseller_stock::Column::ResellerId.eq(reseller_id))
            .all(&*self.db)
            .await?;

        let products = product::Entity::find().all(&*self.db).await?;
        let price_of: HashMap<i64, Decimal> = products.iter().map(|p| (p.id, p.price)).collect();

        let total_units: i64 = stock.iter().map(|s| s.quantity).sum();
        let total_low_stock = stock
            .iter()
            .filter(|s| s.quantity <= s.low_stock_threshold as i64)
            .count();
        let total_value: Decimal = stock
            .iter()
            .map(|s| {
                price_of.get(&s.product_id).copied().unwrap_or(Decimal::ZERO)
                    * Decimal::from(s.quantity)
            })
            .sum();

        Ok(json!({
            "total_units": total_units,
            "total_low_stock": total_low_stock,
            "total_value": total_value,
        }))
    }

    async fn reseller_sales(&self, reseller_id: i64) -> Result<Value, ServiceError> {
        let sales = sale::Entity::find()
            .filter(sale::Column::ResellerId.eq(reseller_id))
            .all(&*self.db)
            .await?;

        let total_sales_value: Decimal = sales.iter().map(|s| s.total_amount).sum();
        let total_units_sold: i64 = sales.iter().map(|s| s.quantity).sum();

        Ok(json!({
            "total_sales_value": total_sales_value,
            "total_units_sold": total_units_sold,
        }))
    }
}
