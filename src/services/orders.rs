use crate::{
    entities::{
        order, order_item, payment, user, Order, OrderItem, OrderStatus, Payment,
        PaymentMethodKind, Product, User,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: i32,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total: Decimal,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub payment_method: Option<PaymentMethodKind>,
    pub reference: Option<String>,
}

impl OrderSummary {
    fn from_parts(order: order::Model, payment: Option<payment::Model>) -> Self {
        Self {
            id: order.id,
            status: order.status,
            total: order.total,
            shipping_address: order.shipping_address,
            notes: order.notes,
            created_at: order.created_at,
            payment_method: payment.as_ref().map(|p| p.method),
            reference: payment.map(|p| p.gateway_reference),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub product_id: i32,
    pub name: Option<String>,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderSummary,
    pub user_id: i32,
    pub items: Vec<OrderLineView>,
}

/// An order as seen in the back-office listing, with its customer.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderListing {
    #[serde(flatten)]
    pub order: OrderSummary,
    pub user_id: i32,
    pub customer_name: Option<String>,
}

/// Read side of orders.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<OrderSummary>, ServiceError> {
        let rows = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .find_also_related(Payment)
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(order, payment)| OrderSummary::from_parts(order, payment))
            .collect())
    }

    /// Every order with its customer, newest first.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<OrderListing>, ServiceError> {
        let rows = Order::find()
            .find_also_related(Payment)
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .all(&*self.db)
            .await?;

        let mut user_ids: Vec<i32> = rows.iter().map(|(order, _)| order.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let names: HashMap<i32, String> = User::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.full_name))
            .collect();

        Ok(rows
            .into_iter()
            .map(|(order, payment)| {
                let user_id = order.user_id;
                OrderListing {
                    order: OrderSummary::from_parts(order, payment),
                    user_id,
                    customer_name: names.get(&user_id).cloned(),
                }
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, order_id: i32) -> Result<OrderDetail, ServiceError> {
        let (order, payment) = Order::find_by_id(order_id)
            .find_also_related(Payment)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .find_also_related(Product)
            .order_by_asc(order_item::Column::Id)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|(item, product)| OrderLineView {
                product_id: item.product_id,
                name: product.map(|p| p.name),
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.subtotal,
            })
            .collect();

        let user_id = order.user_id;
        Ok(OrderDetail {
            order: OrderSummary::from_parts(order, payment),
            user_id,
            items,
        })
    }
}
