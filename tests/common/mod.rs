use std::sync::Arc;

use boffo_api::{
    config::AppConfig,
    db,
    entities::{product, product_batch, user::UserRole},
    events::{self, EventSender},
    services::catalog::CreateProductRequest,
    services::inventory::AddBatchRequest,
    services::users::{CreateUserRequest, UserResponse},
    AppState,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;
use tokio::sync::mpsc;

const TEST_JWT_SECRET: &str = "test_secret_key_for_boffo_api_tests_only_32chars";

/// Test harness backed by a throwaway SQLite database with the embedded
/// migrations applied.
pub struct TestApp {
    pub state: AppState,
    _tmp: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let db_path = tmp.path().join("boffo_test.db");
        let database_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let cfg = AppConfig::new(database_url, TEST_JWT_SECRET.to_string(), "test".to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("connect test database");
        db::run_migrations(&pool)
            .await
            .expect("run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);

        Self {
            state,
            _tmp: tmp,
            _event_task: event_task,
        }
    }

    pub async fn create_admin(&self, email: &str) -> UserResponse {
        self.state
            .users
            .create_user(CreateUserRequest {
                name: "Admin".to_string(),
                email: email.to_string(),
                phone_number: "+254700000000".to_string(),
                role: UserRole::Admin,
                password: "admin-password".to_string(),
            })
            .await
            .expect("create admin")
    }

    pub async fn create_reseller(&self, name: &str, email: &str) -> UserResponse {
        self.state
            .users
            .create_user(CreateUserRequest {
                name: name.to_string(),
                email: email.to_string(),
                phone_number: "+254711000000".to_string(),
                role: UserRole::Staff,
                password: "reseller-password".to_string(),
            })
            .await
            .expect("create reseller")
    }

    pub async fn create_product(&self, name: &str, price: Decimal) -> product::Model {
        self.state
            .catalog
            .create_product(CreateProductRequest {
                name: name.to_string(),
                description: String::new(),
                price,
                category: "Baby Care".to_string(),
                unit: "piece".to_string(),
                low_stock_threshold: 5,
            })
            .await
            .expect("create product")
    }

    pub async fn add_batch(
        &self,
        product_id: i64,
        batch_number: &str,
        quantity: i64,
        purchase_price: Decimal,
        date_received: NaiveDate,
    ) -> product_batch::Model {
        self.state
            .inventory
            .add_batch(AddBatchRequest {
                product_id,
                batch_number: batch_number.to_string(),
                quantity,
                purchase_price,
                date_received: Some(date_received),
            })
            .await
            .expect("add batch")
    }

    pub async fn batch(&self, id: i64) -> product_batch::Model {
        use sea_orm::EntityTrait;

        product_batch::Entity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("query batch")
            .expect("batch exists")
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}
