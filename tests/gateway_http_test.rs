mod common;

use axum::http::{Method, StatusCode};
use common::{card_fields, json_body, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use std::time::Duration;
use storefront_api::services::payment_gateway::HttpPaymentGateway;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn app_against(server: &MockServer) -> TestApp<HttpPaymentGateway> {
    let gateway = HttpPaymentGateway::new(
        &format!("{}/api/payments", server.uri()),
        "Test Shop",
        Duration::from_secs(10),
    )
    .unwrap();
    TestApp::with_gateway(gateway).await
}

#[tokio::test]
async fn approved_http_charge_is_materialized_with_gateway_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payments/card"))
        .and(body_partial_json(json!({
            "cardNumber": "4111111111111111",
            "amount": 51.0,
            "currency": "USD"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "approved", "tx": 7781})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = app_against(&server).await;
    let user = app.seed_user("Ada", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(user.id, mug.id, 2).await;

    let response = app
        .request(Method::POST, "/api/payments/checkout", Some(card_fields(user.id)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let orders = app.state.services.orders.list_for_user(user.id).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].reference.as_deref(), Some("7781"));
}

#[tokio::test]
async fn http_decline_is_402_with_gateway_details() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(402).set_body_json(
            json!({"status": "declined", "error": "Card expired", "code": "EXP"}),
        ))
        .mount(&server)
        .await;

    let app = app_against(&server).await;
    let user = app.seed_user("Ada", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(user.id, mug.id, 1).await;

    let response = app
        .request(Method::POST, "/api/payments/checkout", Some(card_fields(user.id)))
        .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Card expired");
    assert_eq!(body["details"]["code"], "EXP");
}

#[tokio::test]
async fn http_outage_is_502_and_nothing_is_written() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let app = app_against(&server).await;
    let user = app.seed_user("Ada", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(user.id, mug.id, 1).await;

    let response = app
        .request(Method::POST, "/api/payments/checkout", Some(card_fields(user.id)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(app
        .state
        .services
        .orders
        .list_for_user(user.id)
        .await
        .unwrap()
        .is_empty());
}
