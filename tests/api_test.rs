mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::TestApp;
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(app: &TestApp) -> axum::Router {
    boffo_api::app(app.state.clone())
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };

    builder.body(body).unwrap()
}

async fn login(app: &TestApp, email: &str, password: &str) -> String {
    let response = router(app)
        .oneshot(request(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({ "email": email, "password": password })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    body["data"]["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check_is_public() {
    let app = TestApp::new().await;

    let response = router(&app)
        .oneshot(request(Method::GET, "/api/v1/health-check", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new().await;

    let response = router(&app)
        .oneshot(request(Method::GET, "/api/v1/products", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("bearer token"));
}

#[tokio::test]
async fn login_yields_a_working_token() {
    let app = TestApp::new().await;
    app.create_admin("admin@boffo.test").await;

    let token = login(&app, "admin@boffo.test", "admin-password").await;

    let response = router(&app)
        .oneshot(request(
            Method::GET,
            "/api/v1/products?page=1&limit=10",
            Some(&token),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn admin_routes_reject_resellers() {
    let app = TestApp::new().await;
    app.create_reseller("Wanjiku", "wanjiku@resellers.test").await;

    let token = login(&app, "wanjiku@resellers.test", "reseller-password").await;

    let response = router(&app)
        .oneshot(request(
            Method::POST,
            "/api/v1/products",
            Some(&token),
            Some(json!({
                "name": "Baby Wipes",
                "price": "150",
                "category": "Baby Care",
                "unit": "piece"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router(&app)
        .oneshot(request(
            Method::GET,
            "/api/v1/admin/page-data/dashboard",
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn full_product_flow_over_http() {
    let app = TestApp::new().await;
    app.create_admin("admin@boffo.test").await;
    let token = login(&app, "admin@boffo.test", "admin-password").await;

    let response = router(&app)
        .oneshot(request(
            Method::POST,
            "/api/v1/products",
            Some(&token),
            Some(json!({
                "name": "Baby Wipes",
                "description": "80 count",
                "price": "150",
                "category": "Baby Care",
                "unit": "pack",
                "low_stock_threshold": 10
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let product_id = created["data"]["id"].as_i64().unwrap();

    let response = router(&app)
        .oneshot(request(
            Method::POST,
            "/api/v1/company/stock-purchase",
            Some(&token),
            Some(json!({
                "product_id": product_id,
                "batch_number": "BB-2024-500",
                "quantity": 40,
                "purchase_price": "95.50"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router(&app)
        .oneshot(request(
            Method::GET,
            "/api/v1/company/stock?in_stock=true",
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stock = body_json(response).await;
    assert_eq!(stock["data"][0]["quantity"], 40);
}

#[tokio::test]
async fn validation_errors_surface_in_the_message_envelope() {
    let app = TestApp::new().await;
    app.create_admin("admin@boffo.test").await;
    let token = login(&app, "admin@boffo.test", "admin-password").await;

    let response = router(&app)
        .oneshot(request(
            Method::POST,
            "/api/v1/payments",
            Some(&token),
            Some(json!({
                "reseller_id": 1,
                "amount": "-10",
                "method": "CASH"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "amount must be positive");
}
