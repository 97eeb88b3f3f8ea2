mod common;

use boffo_api::entities::{reseller_stock, stock_movement};
use boffo_api::errors::ServiceError;
use boffo_api::services::distribution::DistributeStockRequest;
use boffo_api::services::sales::RecordSaleRequest;
use common::{date, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

async fn seed_reseller_stock(app: &TestApp, reseller_id: i64, product_id: i64, quantity: i64) {
    app.add_batch(
        product_id,
        &format!("BB-SEED-{product_id}"),
        quantity,
        dec!(100),
        date(2024, 6, 1),
    )
    .await;

    app.state
        .distributions
        .distribute(DistributeStockRequest {
            reseller_id,
            product_id,
            quantity,
            unit_price: dec!(150),
            date_distributed: None,
        })
        .await
        .expect("seed distribution");
}

async fn stock_quantity(app: &TestApp, reseller_id: i64, product_id: i64) -> i64 {
    reseller_stock::Entity::find_by_id((reseller_id, product_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .map(|s| s.quantity)
        .unwrap_or(0)
}

#[tokio::test]
async fn sale_decrements_stock_and_appends_ledger_entry() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Wanjiku", "wanjiku@resellers.test").await;
    let product = app.create_product("Baby Wipes", dec!(150)).await;
    seed_reseller_stock(&app, reseller.id, product.id, 20).await;

    let sale = app
        .state
        .sales
        .record_sale(
            reseller.id,
            RecordSaleRequest {
                product_id: product.id,
                quantity: 8,
                selling_price: dec!(199.50),
                date_sold: None,
            },
        )
        .await
        .expect("record sale");

    assert_eq!(sale.total_amount, dec!(1596));
    assert_eq!(stock_quantity(&app, reseller.id, product.id).await, 12);

    let movements = stock_movement::Entity::find()
        .filter(stock_movement::Column::Source.eq("SALE"))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, "OUT");
    assert_eq!(movements[0].owner_type, "RESELLER");
    assert_eq!(movements[0].owner_id, Some(reseller.id));
    assert_eq!(movements[0].quantity, 8);
}

#[tokio::test]
async fn oversell_fails_without_partial_decrement() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Njeri", "njeri@resellers.test").await;
    let product = app.create_product("Diapers", dec!(900)).await;
    seed_reseller_stock(&app, reseller.id, product.id, 5).await;

    let result = app
        .state
        .sales
        .record_sale(
            reseller.id,
            RecordSaleRequest {
                product_id: product.id,
                quantity: 6,
                selling_price: dec!(1000),
                date_sold: None,
            },
        )
        .await;

    assert!(matches!(result, Err(ServiceError::InsufficientStock(_))));
    assert_eq!(stock_quantity(&app, reseller.id, product.id).await, 5);

    let sale_movements = stock_movement::Entity::find()
        .filter(stock_movement::Column::Source.eq("SALE"))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(sale_movements, 0);
}

#[tokio::test]
async fn stock_never_goes_negative_across_a_sale_sequence() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Akinyi", "akinyi@resellers.test").await;
    let product = app.create_product("Baby Lotion", dec!(350)).await;
    seed_reseller_stock(&app, reseller.id, product.id, 10).await;

    let mut successes = 0;
    for _ in 0..20 {
        let result = app
            .state
            .sales
            .record_sale(
                reseller.id,
                RecordSaleRequest {
                    product_id: product.id,
                    quantity: 1,
                    selling_price: dec!(400),
                    date_sold: None,
                },
            )
            .await;

        match result {
            Ok(_) => successes += 1,
            Err(ServiceError::InsufficientStock(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }

        assert!(stock_quantity(&app, reseller.id, product.id).await >= 0);
    }

    assert_eq!(successes, 10);
    assert_eq!(stock_quantity(&app, reseller.id, product.id).await, 0);
}

#[tokio::test]
async fn concurrent_sales_cannot_jointly_overdraw() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Moraa", "moraa@resellers.test").await;
    let product = app.create_product("Baby Shampoo", dec!(420)).await;
    seed_reseller_stock(&app, reseller.id, product.id, 10).await;

    // Two sales of 6 against a stock of 10: individually valid, jointly not.
    let sale_a = app.state.sales.record_sale(
        reseller.id,
        RecordSaleRequest {
            product_id: product.id,
            quantity: 6,
            selling_price: dec!(500),
            date_sold: None,
        },
    );
    let sale_b = app.state.sales.record_sale(
        reseller.id,
        RecordSaleRequest {
            product_id: product.id,
            quantity: 6,
            selling_price: dec!(500),
            date_sold: None,
        },
    );

    let (a, b) = tokio::join!(sale_a, sale_b);
    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();

    assert_eq!(successes, 1, "exactly one of the racing sales may succeed");
    assert_eq!(stock_quantity(&app, reseller.id, product.id).await, 4);
}

#[tokio::test]
async fn sale_consumes_reseller_lots_for_cogs() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Wairimu", "wairimu@resellers.test").await;
    let product = app.create_product("Baby Soap", dec!(150)).await;

    // Two company batches at different costs, distributed in FIFO order.
    app.add_batch(product.id, "BB-2024-200", 6, dec!(60), date(2024, 6, 1))
        .await;
    app.add_batch(product.id, "BB-2024-201", 6, dec!(90), date(2024, 6, 5))
        .await;
    app.state
        .distributions
        .distribute(DistributeStockRequest {
            reseller_id: reseller.id,
            product_id: product.id,
            quantity: 12,
            unit_price: dec!(110),
            date_distributed: None,
        })
        .await
        .unwrap();

    // Selling 8 units crosses the lot boundary: 6 @ 60 + 2 @ 90 = 540.
    app.state
        .sales
        .record_sale(
            reseller.id,
            RecordSaleRequest {
                product_id: product.id,
                quantity: 8,
                selling_price: dec!(200),
                date_sold: None,
            },
        )
        .await
        .unwrap();

    let account = app.state.resellers.account(reseller.id).await.unwrap();
    assert_eq!(account.total_cogs, dec!(540));
    assert_eq!(account.total_sales_value, dec!(1600));
}
