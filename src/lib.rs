//! Boffo API Library
//!
//! Backend for the Boffo Baby inventory and distribution dashboard.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{extract::State, middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::AuthKeys;
use crate::cache::ResponseCache;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::{
    catalog::CatalogService, distribution::DistributionService, goods_requests::GoodsRequestService,
    inventory::InventoryService, movements::MovementService, payments::PaymentService,
    resellers::ResellerService, sales::SalesService, stats::StatsService, users::UserService,
};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: AppConfig,
    pub auth_keys: AuthKeys,
    pub event_sender: EventSender,
    pub users: UserService,
    pub catalog: CatalogService,
    pub inventory: InventoryService,
    pub distributions: DistributionService,
    pub goods_requests: GoodsRequestService,
    pub sales: SalesService,
    pub resellers: ResellerService,
    pub payments: PaymentService,
    pub movements: MovementService,
    pub stats: StatsService,
    pub page_cache: ResponseCache,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: AppConfig, event_sender: EventSender) -> Self {
        let auth_keys = AuthKeys::new(
            &config.jwt_secret,
            Duration::from_secs(config.jwt_expiration),
        );
        let resellers = ResellerService::new(db.clone());

        Self {
            users: UserService::new(db.clone(), auth_keys.clone(), event_sender.clone()),
            catalog: CatalogService::new(db.clone()),
            inventory: InventoryService::new(db.clone(), event_sender.clone()),
            distributions: DistributionService::new(db.clone(), event_sender.clone()),
            goods_requests: GoodsRequestService::new(db.clone(), event_sender.clone()),
            sales: SalesService::new(db.clone(), event_sender.clone()),
            payments: PaymentService::new(db.clone(), event_sender.clone()),
            movements: MovementService::new(db.clone()),
            stats: StatsService::new(db.clone(), resellers.clone()),
            page_cache: ResponseCache::new(Duration::from_secs(config.page_data_ttl_secs)),
            resellers,
            auth_keys,
            event_sender,
            db,
            config,
        }
    }
}

/// The `/api/v1` route tree plus the swagger UI, with all auth layers wired.
pub fn app(state: AppState) -> Router {
    let admin = Router::new()
        .merge(handlers::resellers::admin_routes())
        .merge(handlers::page_data::admin_routes())
        .layer(middleware::from_fn(auth::require_admin));

    let authed = Router::new()
        .merge(handlers::users::routes())
        .merge(handlers::products::routes())
        .merge(handlers::company::routes())
        .merge(handlers::goods_requests::routes())
        .merge(handlers::sales::routes())
        .merge(handlers::resellers::routes())
        .merge(handlers::payments::routes())
        .merge(handlers::stock_movements::routes())
        .merge(handlers::page_data::routes())
        .nest("/admin", admin)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let api = Router::new()
        .route("/health-check", get(health_check))
        .route("/users/login", axum::routing::post(handlers::users::login))
        .merge(authed);

    Router::new()
        .nest("/api/v1", api)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .with_state(state)
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<Value>, ServiceError> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Ok(Json(json!({
        "status": if db_status == "healthy" { "ok" } else { "degraded" },
        "checks": { "database": db_status },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
