use crate::AppState;
use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront API

Cart, checkout and order endpoints for the storefront.

## Checkout and recovery

`POST /api/payments/checkout` charges the cart total through the payment gateway and then records
the order. If the charge is approved but the order cannot be recorded, the response is a `500`
carrying `canFinalize: true` and the gateway `reference`:

```json
{
  "error": "Internal Server Error",
  "message": "Payment was approved but the order could not be recorded",
  "canFinalize": true,
  "reference": "TX123",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

Send that reference to `POST /api/payments/finalize` to record the order without charging again.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Checkout, recovery and direct card charges"),
        (name = "Cart", description = "Shopping cart endpoints"),
        (name = "Payment methods", description = "Stored card management"),
        (name = "Orders", description = "Order read endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Checkout
        crate::handlers::checkout::checkout,
        crate::handlers::checkout::checkout_simulated,
        crate::handlers::checkout::finalize,
        crate::handlers::checkout::charge_card,

        // Cart
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::clear_cart,

        // Payment methods
        crate::handlers::payment_methods::save_simulated_method,
        crate::handlers::payment_methods::update_method,
        crate::handlers::payment_methods::delete_method,
        crate::handlers::payment_methods::list_user_methods,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::list_user_orders,
        crate::handlers::orders::get_order,

        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::services::commerce::CheckoutOutcome,
            crate::services::commerce::CartLine,
            crate::services::orders::OrderSummary,
            crate::services::orders::OrderListing,
            crate::services::orders::OrderDetail,
            crate::services::orders::OrderLineView,
            crate::services::payment_methods::StoredMethodView,
            crate::entities::OrderStatus,
            crate::entities::PaymentMethodKind,
            crate::handlers::carts::CartView,
            crate::handlers::carts::AddItemRequest,
            crate::handlers::carts::UpdateItemRequest,
            crate::handlers::carts::RemoveItemRequest,
            crate::handlers::checkout::CheckoutRequest,
            crate::handlers::checkout::FinalizeRequest,
            crate::handlers::checkout::CardChargeRequest,
            crate::handlers::payment_methods::SaveMethodRequest,
            crate::handlers::payment_methods::UpdateMethodRequest,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ComponentHealth,
            crate::handlers::health::ComponentStatus,
        )
    )
)]
pub struct ApiDoc;

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
