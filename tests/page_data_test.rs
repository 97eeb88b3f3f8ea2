mod common;

use boffo_api::entities::goods_request::GoodsRequestLine;
use boffo_api::entities::payment::{PaymentMethod, RecordedBy};
use boffo_api::errors::ServiceError;
use boffo_api::services::distribution::DistributeStockRequest;
use boffo_api::services::goods_requests::Decision;
use boffo_api::services::payments::RecordPaymentRequest;
use boffo_api::services::sales::RecordSaleRequest;
use common::{date, TestApp};
use rust_decimal_macros::dec;

async fn seed_scenario(app: &TestApp) -> (i64, i64) {
    let reseller = app.create_reseller("Wanjiku", "wanjiku@resellers.test").await;
    let product = app.create_product("Baby Wipes", dec!(150)).await;

    app.add_batch(product.id, "BB-2024-400", 60, dec!(80), date(2024, 9, 1))
        .await;

    app.state
        .distributions
        .distribute(DistributeStockRequest {
            reseller_id: reseller.id,
            product_id: product.id,
            quantity: 25,
            unit_price: dec!(120),
            date_distributed: None,
        })
        .await
        .unwrap();

    app.state
        .sales
        .record_sale(
            reseller.id,
            RecordSaleRequest {
                product_id: product.id,
                quantity: 10,
                selling_price: dec!(180),
                date_sold: None,
            },
        )
        .await
        .unwrap();

    app.state
        .payments
        .record_payment(
            RecordPaymentRequest {
                reseller_id: reseller.id,
                amount: dec!(1500),
                method: PaymentMethod::Mpesa,
                reference: None,
                date_paid: None,
            },
            RecordedBy::Admin,
        )
        .await
        .unwrap();

    (reseller.id, product.id)
}

#[tokio::test]
async fn admin_dashboard_aggregates_follow_the_ledger() {
    let app = TestApp::new().await;
    let (_, _) = seed_scenario(&app).await;

    let data = app.state.stats.admin_page_data("dashboard").await.unwrap();

    assert_eq!(data["total_company_stock"], 35);
    assert_eq!(data["stock_distributed_units"], 25);
    assert_eq!(data["active_resellers"], 1);
    assert_eq!(data["total_pending_requests"], 0);
    assert_eq!(data["weekly_stock_chart"].as_array().unwrap().len(), 7);
    assert!(data["recent_activities"].as_array().unwrap().len() >= 3);
}

#[tokio::test]
async fn admin_stock_movement_totals_balance_out() {
    let app = TestApp::new().await;
    seed_scenario(&app).await;

    let data = app
        .state
        .stats
        .admin_page_data("stock_movements")
        .await
        .unwrap();

    // Purchase IN 60, distribution OUT 25 + IN 25, sale OUT 10.
    assert_eq!(data["total_movements"], 4);
    assert_eq!(data["total_stock_in"], 85);
    assert_eq!(data["total_stock_out"], 35);
    assert_eq!(data["net_movement"], 50);
}

#[tokio::test]
async fn goods_request_counts_track_the_lifecycle() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Njeri", "njeri@resellers.test").await;
    let product = app.create_product("Diapers", dec!(900)).await;
    app.add_batch(product.id, "BB-2024-410", 50, dec!(700), date(2024, 9, 2))
        .await;

    let make_line = || GoodsRequestLine {
        product_id: product.id,
        product_name: "Diapers".to_string(),
        quantity: 2,
        price_requested: dec!(750),
    };

    let approved = app
        .state
        .goods_requests
        .create_request(reseller.id, vec![make_line()])
        .await
        .unwrap();
    app.state
        .goods_requests
        .decide(approved.id, Decision::Approve, "ok")
        .await
        .unwrap();

    let rejected = app
        .state
        .goods_requests
        .create_request(reseller.id, vec![make_line()])
        .await
        .unwrap();
    app.state
        .goods_requests
        .decide(rejected.id, Decision::Reject, "not now")
        .await
        .unwrap();

    let cancelled = app
        .state
        .goods_requests
        .create_request(reseller.id, vec![make_line()])
        .await
        .unwrap();
    app.state
        .goods_requests
        .cancel(cancelled.id, reseller.id)
        .await
        .unwrap();

    app.state
        .goods_requests
        .create_request(reseller.id, vec![make_line()])
        .await
        .unwrap();

    let admin = app
        .state
        .stats
        .admin_page_data("goods_requests")
        .await
        .unwrap();
    assert_eq!(admin["total_approved"], 1);
    assert_eq!(admin["total_rejected"], 1);
    assert_eq!(admin["total_cancelled"], 1);
    assert_eq!(admin["total_pending"], 1);

    let mine = app
        .state
        .stats
        .reseller_page_data(reseller.id, "goods_requests")
        .await
        .unwrap();
    assert_eq!(mine["total_requests"], 4);
    assert_eq!(mine["pending_requests"], 1);
    assert_eq!(mine["approved_requests"], 1);
    assert_eq!(mine["rejected_requests"], 1);
}

#[tokio::test]
async fn reseller_dashboard_and_account_summary() {
    let app = TestApp::new().await;
    let (reseller_id, _) = seed_scenario(&app).await;

    let dashboard = app
        .state
        .stats
        .reseller_page_data(reseller_id, "dashboard")
        .await
        .unwrap();

    assert_eq!(dashboard["current_stock"], 15);
    // Balance: 25 * 120 received - 1500 paid.
    assert_eq!(dashboard["outstanding_balance"], serde_json::json!("1500"));
    assert_eq!(dashboard["total_sales"]["units_sold"], 10);
    assert_eq!(dashboard["recent_sales"].as_array().unwrap().len(), 1);

    let summary = app
        .state
        .stats
        .reseller_page_data(reseller_id, "account_summary")
        .await
        .unwrap();
    assert_eq!(summary["total_stock_received"], 25);

    let unknown = app
        .state
        .stats
        .reseller_page_data(reseller_id, "nonexistent")
        .await;
    assert!(matches!(unknown, Err(ServiceError::ValidationError(_))));
}
