mod common;

use axum::http::{Method, StatusCode};
use common::{card_fields, json_body, RecordingGateway, RecordingMailer, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn receipt_is_mailed_after_checkout() {
    let app = TestApp::new().await;
    let user = app.seed_user("Ada Lovelace", Some("ada@example.com")).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(user.id, mug.id, 2).await;

    let response = app
        .request(Method::POST, "/api/payments/checkout", Some(card_fields(user.id)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let order_id = json_body(response).await["orderId"].as_i64().unwrap();

    let sent = app.wait_for_mail(1).await;
    assert_eq!(sent.len(), 1);
    let mail = &sent[0];
    assert_eq!(mail.to, "ada@example.com");
    assert_eq!(mail.subject, format!("Your order #{}", order_id));
    assert!(mail.text.contains("Hello Ada Lovelace,"));
    assert!(mail.text.contains("Total: 51.00"));

    let attachment = mail.attachment.as_ref().expect("pdf attached");
    assert_eq!(attachment.filename, format!("receipt-{}.pdf", order_id));
    assert_eq!(attachment.content_type, "application/pdf");
    assert!(attachment.bytes.starts_with(b"%PDF-1.4"));
}

#[tokio::test]
async fn finalize_also_sends_a_receipt() {
    let app = TestApp::new().await;
    let user = app.seed_user("Ada", Some("ada@example.com")).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(user.id, mug.id, 1).await;

    let response = app
        .request(
            Method::POST,
            "/api/payments/finalize",
            Some(json!({"userId": user.id, "reference": "TX-LOST"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.wait_for_mail(1).await.len(), 1);
}

#[tokio::test]
async fn user_without_email_still_gets_the_order() {
    let app = TestApp::new().await;
    let user = app.seed_user("Ada", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(user.id, mug.id, 1).await;

    let response = app
        .request(Method::POST, "/api/payments/checkout", Some(card_fields(user.id)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(app.mailer.sent().is_empty());
    assert_eq!(
        app.state.services.orders.list_for_user(user.id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn mail_failure_never_undoes_the_order() {
    let app = TestApp::build(RecordingGateway::approving("TX-1"), RecordingMailer::failing()).await;
    let user = app.seed_user("Ada", Some("ada@example.com")).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(user.id, mug.id, 1).await;

    let response = app
        .request(Method::POST, "/api/payments/checkout", Some(card_fields(user.id)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(app.mailer.sent().is_empty());
    let orders = app.state.services.orders.list_for_user(user.id).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].reference.as_deref(), Some("TX-1"));
}
