mod common;

use boffo_api::entities::payment::{PaymentMethod, RecordedBy};
use boffo_api::errors::ServiceError;
use boffo_api::services::distribution::DistributeStockRequest;
use boffo_api::services::payments::{PaymentFilter, RecordPaymentRequest};
use boffo_api::services::sales::RecordSaleRequest;
use common::{date, TestApp};
use rust_decimal_macros::dec;

#[tokio::test]
async fn balance_is_value_received_minus_payments() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Wanjiku", "wanjiku@resellers.test").await;
    let product = app.create_product("Baby Wipes", dec!(150)).await;

    app.add_batch(product.id, "BB-2024-300", 100, dec!(80), date(2024, 7, 1))
        .await;

    // Goods worth 40 * 120 = 4800 received.
    app.state
        .distributions
        .distribute(DistributeStockRequest {
            reseller_id: reseller.id,
            product_id: product.id,
            quantity: 40,
            unit_price: dec!(120),
            date_distributed: None,
        })
        .await
        .unwrap();

    // Sales proceeds belong to the reseller and must not affect the balance.
    app.state
        .sales
        .record_sale(
            reseller.id,
            RecordSaleRequest {
                product_id: product.id,
                quantity: 30,
                selling_price: dec!(999),
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
                amount: dec!(1800),
                method: PaymentMethod::Mpesa,
                reference: Some("TX123ABC".to_string()),
                date_paid: None,
            },
            RecordedBy::Admin,
        )
        .await
        .unwrap();

    app.state
        .payments
        .record_payment(
            RecordPaymentRequest {
                reseller_id: reseller.id,
                amount: dec!(1000),
                method: PaymentMethod::Cash,
                reference: None,
                date_paid: None,
            },
            RecordedBy::Admin,
        )
        .await
        .unwrap();

    let account = app.state.resellers.account(reseller.id).await.unwrap();
    assert_eq!(account.total_stock_received, 40);
    assert_eq!(account.total_value_received, dec!(4800));
    assert_eq!(account.total_paid, dec!(2800));
    assert_eq!(account.balance, dec!(2000));

    // The (large) sales value is tracked but plays no part in the balance.
    assert_eq!(account.total_sales_value, dec!(29970));
}

#[tokio::test]
async fn payment_validation_and_recording() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Njeri", "njeri@resellers.test").await;

    let rejected = app
        .state
        .payments
        .record_payment(
            RecordPaymentRequest {
                reseller_id: reseller.id,
                amount: dec!(0),
                method: PaymentMethod::Cash,
                reference: None,
                date_paid: None,
            },
            RecordedBy::Admin,
        )
        .await;
    assert!(matches!(rejected, Err(ServiceError::ValidationError(_))));

    let missing = app
        .state
        .payments
        .record_payment(
            RecordPaymentRequest {
                reseller_id: 9999,
                amount: dec!(100),
                method: PaymentMethod::Cash,
                reference: None,
                date_paid: None,
            },
            RecordedBy::Admin,
        )
        .await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));

    let payment = app
        .state
        .payments
        .record_payment(
            RecordPaymentRequest {
                reseller_id: reseller.id,
                amount: dec!(750.25),
                method: PaymentMethod::Mpesa,
                reference: Some("QX9".to_string()),
                date_paid: Some(date(2024, 7, 15)),
            },
            RecordedBy::Admin,
        )
        .await
        .unwrap();

    assert_eq!(payment.recorded_by, "ADMIN");
    assert_eq!(payment.method, "MPESA");
    assert_eq!(payment.amount, dec!(750.25));
    assert_eq!(payment.date_paid, date(2024, 7, 15));
}

#[tokio::test]
async fn payment_listing_filters_by_method_and_date() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Akinyi", "akinyi@resellers.test").await;

    for (amount, method, day) in [
        (dec!(100), PaymentMethod::Cash, 1),
        (dec!(200), PaymentMethod::Mpesa, 10),
        (dec!(300), PaymentMethod::Mpesa, 20),
    ] {
        app.state
            .payments
            .record_payment(
                RecordPaymentRequest {
                    reseller_id: reseller.id,
                    amount,
                    method,
                    reference: None,
                    date_paid: Some(date(2024, 8, day)),
                },
                RecordedBy::Admin,
            )
            .await
            .unwrap();
    }

    let (mpesa, total) = app
        .state
        .payments
        .list_payments(&PaymentFilter {
            page: 1,
            page_size: 10,
            method: Some("MPESA".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert!(mpesa.iter().all(|p| p.payment.method == "MPESA"));

    let (windowed, total) = app
        .state
        .payments
        .list_payments(&PaymentFilter {
            page: 1,
            page_size: 10,
            date_from: Some(date(2024, 8, 5)),
            date_to: Some(date(2024, 8, 15)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(windowed[0].payment.amount, dec!(200));
}
