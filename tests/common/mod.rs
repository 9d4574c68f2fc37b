#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::{json, Value};
use storefront_api::{
    build_router,
    config::AppConfig,
    db,
    entities::{product, user, Product},
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        card_vault::CardVault,
        notifications::{Mailer, OrderNotifier, OutgoingMail},
        payment_gateway::{ChargeApproval, ChargeRequest, PaymentGateway},
    },
    AppState,
};
use tower::ServiceExt;

pub const VAULT_SECRET: &str = "integration-test-vault-secret-0123456789";

/// What the scripted gateway answers.
#[derive(Debug, Clone)]
pub enum GatewayOutcome {
    Approve(String),
    Decline(String),
    Unavailable,
}

/// Gateway double that records every charge and answers from a script.
pub struct RecordingGateway {
    outcome: Mutex<GatewayOutcome>,
    calls: AtomicUsize,
    last_request: Mutex<Option<ChargeRequest>>,
    /// Applied while "charging", to simulate a price change racing the charge.
    reprice_during_charge: Mutex<Option<(Arc<DatabaseConnection>, i32, Decimal)>>,
}

impl RecordingGateway {
    pub fn approving(reference: &str) -> Self {
        Self::scripted(GatewayOutcome::Approve(reference.to_string()))
    }

    pub fn scripted(outcome: GatewayOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            reprice_during_charge: Mutex::new(None),
        }
    }

    pub fn set_outcome(&self, outcome: GatewayOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChargeRequest> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn reprice_during_charge(&self, db: Arc<DatabaseConnection>, product_id: i32, price: Decimal) {
        *self.reprice_during_charge.lock().unwrap() = Some((db, product_id, price));
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeApproval, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let reprice = self.reprice_during_charge.lock().unwrap().take();
        if let Some((db, product_id, price)) = reprice {
            set_list_price(&db, product_id, price).await;
        }

        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            GatewayOutcome::Approve(reference) => Ok(ChargeApproval {
                raw: json!({"status": "approved", "reference": reference}),
                reference,
            }),
            GatewayOutcome::Decline(message) => Err(ServiceError::Declined {
                details: Some(json!({"status": "declined", "message": message})),
                message,
            }),
            GatewayOutcome::Unavailable => Err(ServiceError::GatewayUnavailable(
                "connection refused".to_string(),
            )),
        }
    }
}

/// Mailer double that keeps every message, or fails on demand.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::NotifierFailure("smtp down".to_string()));
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

/// Application wired to an in-memory SQLite database and test doubles.
pub struct TestApp<G = RecordingGateway> {
    router: Router,
    pub state: AppState,
    pub db: Arc<DatabaseConnection>,
    pub gateway: Arc<G>,
    pub mailer: Arc<RecordingMailer>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp<RecordingGateway> {
    pub async fn new() -> Self {
        Self::with_gateway(RecordingGateway::approving("TX-1")).await
    }
}

impl<G: PaymentGateway + 'static> TestApp<G> {
    pub async fn with_gateway(gateway: G) -> Self {
        Self::build(gateway, RecordingMailer::default()).await
    }

    pub async fn build(gateway: G, mailer: RecordingMailer) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "http://gateway.invalid".to_string(),
            VAULT_SECRET.to_string(),
            "test".to_string(),
        );
        // One connection, kept alive, so every query sees the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.db_idle_timeout_secs = 3600;
        cfg.cors_allow_any_origin = true;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);

        let gateway = Arc::new(gateway);
        let mailer = Arc::new(mailer);
        let notifier = Arc::new(OrderNotifier::new(db.clone(), mailer.clone()));

        let (event_sender, event_rx) = EventSender::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx, notifier));

        let vault = Arc::new(CardVault::new(VAULT_SECRET).expect("vault"));
        let services = AppServices::new(
            db.clone(),
            vault,
            gateway.clone(),
            Arc::new(event_sender),
            cfg.default_currency.clone(),
        );

        let state = AppState {
            db: db.clone(),
            config: Arc::new(cfg),
            services,
        };

        Self {
            router: build_router(state.clone()),
            state,
            db,
            gateway,
            mailer,
            _event_task: event_task,
        }
    }

    /// Send a request against the router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_user(&self, name: &str, email: Option<&str>) -> user::Model {
        user::ActiveModel {
            full_name: Set(name.to_string()),
            email: Set(email.map(str::to_string)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("seed user")
    }

    pub async fn seed_product(&self, sku: &str, list_price: Decimal, stock: i32) -> product::Model {
        product::ActiveModel {
            name: Set(format!("Product {}", sku)),
            sku: Set(sku.to_string()),
            list_price: Set(list_price),
            discount_price: Set(None),
            on_sale: Set(false),
            stock: Set(stock),
            is_active: Set(true),
            image_url: Set(None),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("seed product")
    }

    pub async fn put_on_sale(&self, product_id: i32, discount_price: Decimal) {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await
            .unwrap()
            .expect("product exists");
        let mut active: product::ActiveModel = product.into();
        active.discount_price = Set(Some(discount_price));
        active.on_sale = Set(true);
        active.update(&*self.db).await.expect("put product on sale");
    }

    pub async fn deactivate_product(&self, product_id: i32) {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await
            .unwrap()
            .expect("product exists");
        let mut active: product::ActiveModel = product.into();
        active.is_active = Set(false);
        active.update(&*self.db).await.expect("deactivate product");
    }

    pub async fn add_to_cart(&self, user_id: i32, product_id: i32, quantity: i32) {
        self.state
            .services
            .cart
            .add_item(user_id, product_id, quantity)
            .await
            .expect("add to cart");
    }

    /// Waits for the background notifier to deliver `count` messages.
    pub async fn wait_for_mail(&self, count: usize) -> Vec<OutgoingMail> {
        for _ in 0..100 {
            let sent = self.mailer.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.mailer.sent()
    }
}

impl<G> Drop for TestApp<G> {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn set_list_price(db: &DatabaseConnection, product_id: i32, price: Decimal) {
    let product = Product::find_by_id(product_id)
        .one(db)
        .await
        .unwrap()
        .expect("product exists");
    let mut active: product::ActiveModel = product.into();
    active.list_price = Set(price);
    active.update(db).await.expect("reprice product");
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is json")
    }
}

/// Card body fields the gateway double accepts.
pub fn card_fields(user_id: i32) -> Value {
    json!({
        "userId": user_id,
        "cardNumber": "4111 1111 1111 1111",
        "expMonth": "12",
        "expYear": "2030",
        "cvv": "123",
        "holderName": "Ada Lovelace"
    })
}
