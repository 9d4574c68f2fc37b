use crate::{
    events::EventSender,
    services::{
        card_vault::CardVault,
        commerce::{CartService, CheckoutService},
        orders::OrderService,
        payment_gateway::PaymentGateway,
        payment_methods::PaymentMethodService,
    },
    AppState,
};
use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod carts;
pub mod checkout;
pub mod common;
pub mod health;
pub mod orders;
pub mod payment_methods;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub payment_methods: Arc<PaymentMethodService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        vault: Arc<CardVault>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
        default_currency: String,
    ) -> Self {
        let payment_methods = PaymentMethodService::new(db.clone(), vault);
        let checkout = CheckoutService::new(
            db.clone(),
            payment_methods.clone(),
            gateway,
            event_sender,
            default_currency,
        );

        Self {
            cart: Arc::new(CartService::new(db.clone())),
            checkout: Arc::new(checkout),
            payment_methods: Arc::new(payment_methods),
            orders: Arc::new(OrderService::new(db)),
        }
    }
}

/// Routes under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", carts::cart_routes())
        .nest(
            "/payments",
            checkout::checkout_routes()
                .nest("/methods", payment_methods::payment_method_routes()),
        )
        .nest("/orders", orders::order_routes())
}
