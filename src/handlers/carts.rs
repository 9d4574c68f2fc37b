use crate::{
    errors::ServiceError,
    handlers::common::{created_response, success_response, ValidJson},
    services::commerce::{CartLine, CartSnapshot},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/:user_id", get(get_cart))
        .route(
            "/item",
            post(add_item).put(update_item).delete(remove_item),
        )
        .route("/clear/:user_id", delete(clear_cart))
}

/// Cart as returned to clients; `total` uses current effective prices.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub cart_id: i32,
    pub items: Vec<CartLine>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 75.5)]
    pub total: Decimal,
}

impl From<CartSnapshot> for CartView {
    fn from(snapshot: CartSnapshot) -> Self {
        let total = snapshot.total();
        Self {
            cart_id: snapshot.cart_id,
            items: snapshot.items,
            total,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    #[validate(range(min = 1))]
    pub user_id: i32,
    #[validate(range(min = 1))]
    pub product_id: i32,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 10000))]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    #[validate(range(min = 1))]
    pub user_id: i32,
    #[validate(range(min = 1))]
    pub product_id: i32,
    /// Zero removes the line
    #[validate(range(min = 0, max = 10000))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemRequest {
    #[validate(range(min = 1))]
    pub user_id: i32,
    #[validate(range(min = 1))]
    pub product_id: i32,
}

/// Get the user's active cart, opening one if needed
#[utoipa::path(
    get,
    path = "/api/cart/:user_id",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Active cart", body = CartView),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Response, ServiceError> {
    let cart = state.services.cart.get_active_cart_lines(user_id).await?;
    Ok(success_response(CartView::from(cart)))
}

/// Add a product to the cart, accumulating onto an existing line
#[utoipa::path(
    post,
    path = "/api/cart/item",
    request_body = AddItemRequest,
    responses(
        (status = 201, description = "Item added", body = CartView),
        (status = 400, description = "Invalid quantity or not enough stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "User or product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<AddItemRequest>,
) -> Result<Response, ServiceError> {
    let cart = state
        .services
        .cart
        .add_item(payload.user_id, payload.product_id, payload.quantity)
        .await?;
    Ok(created_response(CartView::from(cart)))
}

/// Set a line's quantity
#[utoipa::path(
    put,
    path = "/api/cart/item",
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Cart updated", body = CartView),
        (status = 400, description = "Invalid quantity or not enough stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not in cart", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<UpdateItemRequest>,
) -> Result<Response, ServiceError> {
    let cart = state
        .services
        .cart
        .set_item_quantity(payload.user_id, payload.product_id, payload.quantity)
        .await?;
    Ok(success_response(CartView::from(cart)))
}

/// Remove a product from the cart
#[utoipa::path(
    delete,
    path = "/api/cart/item",
    request_body = RemoveItemRequest,
    responses(
        (status = 200, description = "Item removed", body = CartView),
        (status = 404, description = "Product not in cart", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RemoveItemRequest>,
) -> Result<Response, ServiceError> {
    let cart = state
        .services
        .cart
        .remove_item(payload.user_id, payload.product_id)
        .await?;
    Ok(success_response(CartView::from(cart)))
}

/// Empty the cart; the cart itself stays open
#[utoipa::path(
    delete,
    path = "/api/cart/clear/:user_id",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Cart cleared", body = CartView),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Response, ServiceError> {
    let cart = state.services.cart.clear(user_id).await?;
    Ok(success_response(CartView::from(cart)))
}
