mod common;

use boffo_api::entities::goods_request::GoodsRequestLine;
use boffo_api::entities::reseller_stock;
use boffo_api::errors::ServiceError;
use boffo_api::services::goods_requests::Decision;
use common::{date, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;

fn line(product_id: i64, name: &str, quantity: i64, price: rust_decimal::Decimal) -> GoodsRequestLine {
    GoodsRequestLine {
        product_id,
        product_name: name.to_string(),
        quantity,
        price_requested: price,
    }
}

#[tokio::test]
async fn approval_distributes_each_requested_line() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Wanjiku", "wanjiku@resellers.test").await;
    let product = app.create_product("Baby Wipes", dec!(120)).await;
    app.add_batch(product.id, "BB-2024-100", 50, dec!(70), date(2024, 5, 1))
        .await;

    let request = app
        .state
        .goods_requests
        .create_request(
            reseller.id,
            vec![line(product.id, "Baby Wipes", 10, dec!(50))],
        )
        .await
        .expect("create request");
    assert_eq!(request.status, "PENDING");
    assert!(!request.cancelled);

    let decided = app
        .state
        .goods_requests
        .decide(request.id, Decision::Approve, "ok")
        .await
        .expect("approve");

    assert_eq!(decided.status, "APPROVED");
    assert_eq!(decided.comment.as_deref(), Some("ok"));

    // Approval created the distribution at the requested price.
    let stock = reseller_stock::Entity::find_by_id((reseller.id, product.id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("stock row");
    assert_eq!(stock.quantity, 10);

    let (distributions, total) = app
        .state
        .distributions
        .list_distributions(&boffo_api::services::distribution::DistributionFilter {
            page: 1,
            page_size: 10,
            reseller_id: Some(reseller.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(distributions[0].distribution.quantity, 10);
    assert_eq!(distributions[0].distribution.unit_price, dec!(50));
    assert_eq!(distributions[0].distribution.total_price, dec!(500));

    // A decided request is terminal.
    let again = app
        .state
        .goods_requests
        .decide(request.id, Decision::Reject, "changed my mind")
        .await;
    assert!(matches!(again, Err(ServiceError::InvalidTransition(_))));

    let cancel = app.state.goods_requests.cancel(request.id, reseller.id).await;
    assert!(matches!(cancel, Err(ServiceError::InvalidTransition(_))));

    let update = app
        .state
        .goods_requests
        .update_payload(
            request.id,
            reseller.id,
            vec![line(product.id, "Baby Wipes", 2, dec!(45))],
        )
        .await;
    assert!(matches!(update, Err(ServiceError::InvalidTransition(_))));
}

#[tokio::test]
async fn rejection_keeps_stock_untouched() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Njeri", "njeri@resellers.test").await;
    let product = app.create_product("Diapers", dec!(900)).await;
    let batch = app
        .add_batch(product.id, "BB-2024-110", 40, dec!(650), date(2024, 5, 2))
        .await;

    let request = app
        .state
        .goods_requests
        .create_request(reseller.id, vec![line(product.id, "Diapers", 5, dec!(700))])
        .await
        .unwrap();

    let decided = app
        .state
        .goods_requests
        .decide(request.id, Decision::Reject, "out of season")
        .await
        .expect("reject");

    assert_eq!(decided.status, "REJECTED");
    assert_eq!(app.batch(batch.id).await.remaining_quantity, 40);

    let stock = reseller_stock::Entity::find_by_id((reseller.id, product.id))
        .one(&*app.state.db)
        .await
        .unwrap();
    assert!(stock.is_none());
}

#[tokio::test]
async fn cancellation_is_terminal_but_status_stays_pending() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Akinyi", "akinyi@resellers.test").await;
    let product = app.create_product("Baby Oil", dec!(250)).await;

    let request = app
        .state
        .goods_requests
        .create_request(reseller.id, vec![line(product.id, "Baby Oil", 3, dec!(200))])
        .await
        .unwrap();

    app.state
        .goods_requests
        .cancel(request.id, reseller.id)
        .await
        .expect("cancel");

    let cancelled = app.state.goods_requests.get_request(request.id).await.unwrap();
    assert!(cancelled.cancelled);
    assert!(cancelled.cancelled_at.is_some());
    // The status field is untouched; the dashboard renders "Cancelled" from
    // the flag alone.
    assert_eq!(cancelled.status, "PENDING");

    let decide = app
        .state
        .goods_requests
        .decide(request.id, Decision::Approve, "too late")
        .await;
    assert!(matches!(decide, Err(ServiceError::InvalidTransition(_))));

    let update = app
        .state
        .goods_requests
        .update_payload(
            request.id,
            reseller.id,
            vec![line(product.id, "Baby Oil", 6, dec!(180))],
        )
        .await;
    assert!(matches!(update, Err(ServiceError::InvalidTransition(_))));

    let cancel_again = app.state.goods_requests.cancel(request.id, reseller.id).await;
    assert!(matches!(cancel_again, Err(ServiceError::InvalidTransition(_))));
}

#[tokio::test]
async fn failed_approval_leaves_request_pending() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Moraa", "moraa@resellers.test").await;
    let product = app.create_product("Baby Powder", dec!(300)).await;
    let batch = app
        .add_batch(product.id, "BB-2024-120", 4, dec!(180), date(2024, 5, 3))
        .await;

    let request = app
        .state
        .goods_requests
        .create_request(
            reseller.id,
            vec![line(product.id, "Baby Powder", 10, dec!(220))],
        )
        .await
        .unwrap();

    let result = app
        .state
        .goods_requests
        .decide(request.id, Decision::Approve, "go ahead")
        .await;
    assert!(matches!(result, Err(ServiceError::InsufficientStock(_))));

    // The whole approval rolled back: still pending, stock untouched.
    let reloaded = app.state.goods_requests.get_request(request.id).await.unwrap();
    assert_eq!(reloaded.status, "PENDING");
    assert!(!reloaded.cancelled);
    assert_eq!(app.batch(batch.id).await.remaining_quantity, 4);

    // The reseller can still cancel after the failed approval.
    app.state
        .goods_requests
        .cancel(request.id, reseller.id)
        .await
        .expect("cancel still possible");
}

#[tokio::test]
async fn payload_update_replaces_wholesale_and_is_owner_gated() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Wairimu", "wairimu@resellers.test").await;
    let other = app.create_reseller("Chebet", "chebet@resellers.test").await;
    let product = app.create_product("Baby Soap", dec!(150)).await;

    let request = app
        .state
        .goods_requests
        .create_request(
            reseller.id,
            vec![
                line(product.id, "Baby Soap", 5, dec!(120)),
                line(product.id, "Baby Soap", 2, dec!(110)),
            ],
        )
        .await
        .unwrap();

    let updated = app
        .state
        .goods_requests
        .update_payload(
            request.id,
            reseller.id,
            vec![line(product.id, "Baby Soap", 9, dec!(115))],
        )
        .await
        .expect("update payload");
    assert_eq!(updated.payload.len(), 1);
    assert_eq!(updated.payload[0].quantity, 9);

    let foreign = app
        .state
        .goods_requests
        .update_payload(
            request.id,
            other.id,
            vec![line(product.id, "Baby Soap", 1, dec!(100))],
        )
        .await;
    assert!(matches!(foreign, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
async fn request_validation_rules() {
    let app = TestApp::new().await;
    let reseller = app.create_reseller("Nyambura", "nyambura@resellers.test").await;
    let product = app.create_product("Baby Food", dec!(500)).await;

    let empty = app.state.goods_requests.create_request(reseller.id, vec![]).await;
    assert!(matches!(empty, Err(ServiceError::ValidationError(_))));

    let zero_qty = app
        .state
        .goods_requests
        .create_request(reseller.id, vec![line(product.id, "Baby Food", 0, dec!(400))])
        .await;
    assert!(matches!(zero_qty, Err(ServiceError::ValidationError(_))));

    let request = app
        .state
        .goods_requests
        .create_request(reseller.id, vec![line(product.id, "Baby Food", 2, dec!(400))])
        .await
        .unwrap();

    let no_comment = app
        .state
        .goods_requests
        .decide(request.id, Decision::Approve, "   ")
        .await;
    assert!(matches!(no_comment, Err(ServiceError::ValidationError(_))));
}
