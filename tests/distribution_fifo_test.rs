mod common;

use boffo_api::entities::{reseller_stock, stock_movement};
use boffo_api::errors::ServiceError;
use boffo_api::services::distribution::DistributeStockRequest;
use common::{date, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

#[tokio::test]
async fn distribution_consumes_batches_oldest_first() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Wanjiku", "wanjiku@resellers.test").await;
    let product = app.create_product("Baby Wipes", dec!(150)).await;

    let b1 = app
        .add_batch(product.id, "BB-2024-001", 30, dec!(80), date(2024, 1, 1))
        .await;
    let b2 = app
        .add_batch(product.id, "BB-2024-002", 20, dec!(85), date(2024, 1, 5))
        .await;

    let distribution = app
        .state
        .distributions
        .distribute(DistributeStockRequest {
            reseller_id: reseller.id,
            product_id: product.id,
            quantity: 35,
            unit_price: dec!(100),
            date_distributed: None,
        })
        .await
        .expect("distribute");

    assert_eq!(distribution.quantity, 35);
    assert_eq!(distribution.total_price, dec!(3500));

    // Oldest batch drained first, the newer one partially consumed.
    assert_eq!(app.batch(b1.id).await.remaining_quantity, 0);
    assert_eq!(app.batch(b2.id).await.remaining_quantity, 15);

    let stock = reseller_stock::Entity::find_by_id((reseller.id, product.id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("reseller stock row");
    assert_eq!(stock.quantity, 35);

    // Paired ledger entries: company OUT and reseller IN.
    let movements = stock_movement::Entity::find()
        .filter(stock_movement::Column::Source.eq("DISTRIBUTION"))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(movements.len(), 2);
    assert!(movements
        .iter()
        .any(|m| m.owner_type == "COMPANY" && m.movement_type == "OUT" && m.quantity == 35));
    assert!(movements.iter().any(|m| {
        m.owner_type == "RESELLER"
            && m.movement_type == "IN"
            && m.owner_id == Some(reseller.id)
    }));
}

#[tokio::test]
async fn insufficient_stock_aborts_without_partial_mutation() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Njeri", "njeri@resellers.test").await;
    let product = app.create_product("Diapers", dec!(900)).await;

    let b1 = app
        .add_batch(product.id, "BB-2024-010", 10, dec!(700), date(2024, 2, 1))
        .await;
    let b2 = app
        .add_batch(product.id, "BB-2024-011", 5, dec!(720), date(2024, 2, 3))
        .await;

    let result = app
        .state
        .distributions
        .distribute(DistributeStockRequest {
            reseller_id: reseller.id,
            product_id: product.id,
            quantity: 40,
            unit_price: dec!(800),
            date_distributed: None,
        })
        .await;

    assert!(matches!(result, Err(ServiceError::InsufficientStock(_))));

    // All-or-nothing: no batch was touched, no reseller stock appeared.
    assert_eq!(app.batch(b1.id).await.remaining_quantity, 10);
    assert_eq!(app.batch(b2.id).await.remaining_quantity, 5);

    let stock = reseller_stock::Entity::find_by_id((reseller.id, product.id))
        .one(&*app.state.db)
        .await
        .unwrap();
    assert!(stock.is_none());

    let movements = stock_movement::Entity::find()
        .filter(stock_movement::Column::Source.eq("DISTRIBUTION"))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert!(movements.is_empty());
}

#[tokio::test]
async fn repeated_distributions_conserve_total_quantity() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Akinyi", "akinyi@resellers.test").await;
    let product = app.create_product("Baby Lotion", dec!(350)).await;

    let batches = [
        app.add_batch(product.id, "BB-2024-020", 12, dec!(200), date(2024, 3, 1))
            .await,
        app.add_batch(product.id, "BB-2024-021", 8, dec!(210), date(2024, 3, 4))
            .await,
        app.add_batch(product.id, "BB-2024-022", 25, dec!(190), date(2024, 3, 9))
            .await,
    ];
    let initial_total: i64 = 12 + 8 + 25;

    let mut distributed = 0;
    for quantity in [5, 11, 7] {
        app.state
            .distributions
            .distribute(DistributeStockRequest {
                reseller_id: reseller.id,
                product_id: product.id,
                quantity,
                unit_price: dec!(250),
                date_distributed: None,
            })
            .await
            .expect("distribute");
        distributed += quantity;
    }

    let mut remaining_total = 0;
    for batch in &batches {
        remaining_total += app.batch(batch.id).await.remaining_quantity;
    }

    assert_eq!(remaining_total, initial_total - distributed);

    // FIFO means the oldest batch empties before the next one is touched.
    assert_eq!(app.batch(batches[0].id).await.remaining_quantity, 0);
    assert_eq!(app.batch(batches[1].id).await.remaining_quantity, 0);
    assert_eq!(app.batch(batches[2].id).await.remaining_quantity, 22);
}

#[tokio::test]
async fn distribution_price_arithmetic_is_exact() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Moraa", "moraa@resellers.test").await;
    let product = app.create_product("Baby Shampoo", dec!(420)).await;

    app.add_batch(product.id, "BB-2024-030", 100, dec!(300.10), date(2024, 4, 1))
        .await;

    let distribution = app
        .state
        .distributions
        .distribute(DistributeStockRequest {
            reseller_id: reseller.id,
            product_id: product.id,
            quantity: 3,
            unit_price: dec!(33.33),
            date_distributed: None,
        })
        .await
        .expect("distribute");

    assert_eq!(distribution.total_price, dec!(99.99));
}
