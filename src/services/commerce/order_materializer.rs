use crate::{
    db::supports_row_locks,
    entities::{cart, cart_item, order, order_item, payment, Cart, CartItem, OrderStatus, PaymentMethodKind},
    errors::ServiceError,
    services::commerce::{
        cart_service::{CartLine, CartService},
        pricing_service::{line_subtotal, order_total, round_money, PricingService},
    },
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Everything needed to turn an approved charge into an order.
#[derive(Debug, Clone)]
pub struct MaterializeRequest {
    pub user_id: i32,
    pub cart_id: i32,
    /// Lines as they were when the cart was priced; the cart must still hold exactly these
    pub lines: Vec<CartLine>,
    pub gateway_reference: String,
    pub method: PaymentMethodKind,
    /// Amount the gateway charged, when there was a charge
    pub charged_amount: Option<Decimal>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedLine {
    pub product_id: i32,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedOrder {
    pub order_id: i32,
    pub total: Decimal,
    pub lines: Vec<MaterializedLine>,
}

/// Writes order, lines, payment and cart closure as one transaction.
#[derive(Clone)]
pub struct OrderMaterializer {
    db: Arc<DatabaseConnection>,
}

impl OrderMaterializer {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Commits every write or none of them.
    ///
    /// The cart row is locked first (where the backend has row locks) and its
    /// closure is conditional on it still being active, so two concurrent
    /// materializations of one cart cannot both succeed.
    #[instrument(skip(self, request), fields(user_id = request.user_id, cart_id = request.cart_id, reference = %request.gateway_reference))]
    pub async fn materialize(
        &self,
        request: MaterializeRequest,
    ) -> Result<MaterializedOrder, ServiceError> {
        let txn = self.db.begin().await?;

        match write_order(&txn, &request).await {
            Ok(materialized) => {
                txn.commit().await?;
                counter!("storefront_db.transaction.committed", 1);
                info!(
                    order_id = materialized.order_id,
                    total = %materialized.total,
                    "Order materialized"
                );
                Ok(materialized)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    error!(error = %rollback_err, "Rollback failed");
                }
                counter!("storefront_db.transaction.rolled_back", 1);
                warn!(error = %err, "Order materialization rolled back");
                Err(err)
            }
        }
    }
}

async fn write_order(
    txn: &DatabaseTransaction,
    request: &MaterializeRequest,
) -> Result<MaterializedOrder, ServiceError> {
    let mut cart_query = Cart::find_by_id(request.cart_id);
    if supports_row_locks(txn) {
        cart_query = cart_query.lock_exclusive();
    }
    let cart = cart_query
        .one(txn)
        .await?
        .filter(|c| c.user_id == request.user_id)
        .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", request.cart_id)))?;

    if !cart.is_active {
        return Err(ServiceError::Conflict(format!(
            "Cart {} is already closed",
            cart.id
        )));
    }

    let current = CartService::load_lines(txn, cart.id).await?;
    if current.is_empty() {
        return Err(ServiceError::EmptyCart);
    }
    if line_keys(&current) != line_keys(&request.lines) {
        return Err(ServiceError::Conflict(
            "Cart changed after it was priced".to_string(),
        ));
    }

    let mut lines = Vec::with_capacity(current.len());
    for line in &current {
        let product = PricingService::active_product(txn, line.product_id).await?;
        let unit_price = round_money(product.effective_price());
        lines.push(MaterializedLine {
            product_id: line.product_id,
            name: product.name,
            quantity: line.quantity,
            unit_price,
            subtotal: line_subtotal(line.quantity, unit_price),
        });
    }
    let total = order_total(lines.iter().map(|l| l.subtotal));

    if let Some(charged) = request.charged_amount {
        if round_money(charged) != total {
            return Err(ServiceError::Conflict(format!(
                "Charged {} but the cart now totals {}",
                charged, total
            )));
        }
    }

    let now = Utc::now();
    let order = order::ActiveModel {
        user_id: Set(request.user_id),
        status: Set(OrderStatus::Paid),
        total: Set(total),
        shipping_address: Set(request.shipping_address.clone()),
        notes: Set(request.notes.clone()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    for line in &lines {
        order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            subtotal: Set(line.subtotal),
            ..Default::default()
        }
        .insert(txn)
        .await?;
    }

    payment::ActiveModel {
        order_id: Set(order.id),
        method: Set(request.method),
        amount: Set(total),
        paid_at: Set(now),
        gateway_reference: Set(request.gateway_reference.clone()),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let closed = Cart::update_many()
        .col_expr(cart::Column::IsActive, Expr::value(false))
        .col_expr(cart::Column::UpdatedAt, Expr::value(now))
        .filter(cart::Column::Id.eq(cart.id))
        .filter(cart::Column::IsActive.eq(true))
        .exec(txn)
        .await?;
    if closed.rows_affected != 1 {
        return Err(ServiceError::Conflict(format!(
            "Cart {} was closed concurrently",
            cart.id
        )));
    }

    CartItem::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(txn)
        .await?;

    Ok(MaterializedOrder {
        order_id: order.id,
        total,
        lines,
    })
}

fn line_keys(lines: &[CartLine]) -> Vec<(i32, i32)> {
    let mut keys: Vec<(i32, i32)> = lines.iter().map(|l| (l.product_id, l.quantity)).collect();
    keys.sort_unstable();
    keys
}
