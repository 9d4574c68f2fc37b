use crate::{
    errors::ServiceError,
    handlers::common::success_response,
    services::orders::{OrderDetail, OrderListing, OrderSummary},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Router,
};

/// Creates the router for order read endpoints
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/user/:user_id", get(list_user_orders))
        .route("/:id", get(get_order))
}

/// All orders with their customers, newest first
#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "Orders", body = [OrderListing])
    ),
    tag = "Orders"
)]
pub async fn list_orders(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let orders = state.services.orders.list_all().await?;
    Ok(success_response(orders))
}

/// A user's orders, newest first
#[utoipa::path(
    get,
    path = "/api/orders/user/:user_id",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Orders", body = [OrderSummary])
    ),
    tag = "Orders"
)]
pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Response, ServiceError> {
    let orders = state.services.orders.list_for_user(user_id).await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/orders/:id",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with its lines", body = OrderDetail),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    let order = state.services.orders.get(id).await?;
    Ok(success_response(order))
}
