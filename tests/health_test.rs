mod common;

use axum::http::{Method, StatusCode};
use common::{json_body, TestApp};

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = json_body(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"]["status"], "up");
}

#[tokio::test]
async fn openapi_document_lists_checkout_routes() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert!(doc["paths"]["/api/payments/checkout"]["post"].is_object());
    assert!(doc["paths"]["/api/payments/finalize"]["post"].is_object());
}

#[tokio::test]
async fn unknown_order_is_404_with_error_body() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/orders/777", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Not Found");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn malformed_json_is_a_400() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/cart/item",
            Some(serde_json::json!({"userId": "not a number"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
