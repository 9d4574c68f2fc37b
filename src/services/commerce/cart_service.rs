use crate::{
    entities::{cart, cart_item, product, Cart, CartItem, Product, User},
    errors::ServiceError,
    services::commerce::pricing_service::{line_subtotal, order_total, round_money, PricingService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// One cart line joined with its product, priced twice: at add time and now.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: i32,
    pub name: String,
    pub sku: String,
    pub image_url: Option<String>,
    pub stock: i32,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub snapshot_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub effective_price: Decimal,
}

/// The user's active cart as read at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub cart_id: i32,
    pub user_id: i32,
    pub items: Vec<CartLine>,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total at current effective prices.
    pub fn total(&self) -> Decimal {
        order_total(
            self.items
                .iter()
                .map(|line| line_subtotal(line.quantity, line.effective_price)),
        )
    }
}

/// Cart reads and edits. Every user has at most one active cart, created on first access.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Returns the user's active cart with its lines, creating an empty cart if none exists.
    ///
    /// Never fails on an empty cart; deciding what an empty cart means is up to the caller.
    #[instrument(skip(self))]
    pub async fn get_active_cart_lines(&self, user_id: i32) -> Result<CartSnapshot, ServiceError> {
        let cart = Self::find_or_create_active_cart(&*self.db, user_id).await?;
        let items = Self::load_lines(&*self.db, cart.id).await?;
        Ok(CartSnapshot {
            cart_id: cart.id,
            user_id,
            items,
        })
    }

    /// Adds `quantity` units of a product, accumulating onto an existing line.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: i32,
        product_id: i32,
        quantity: i32,
    ) -> Result<CartSnapshot, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let cart = Self::find_or_create_active_cart(&txn, user_id).await?;
        let product = PricingService::active_product(&txn, product_id).await?;

        if product.stock <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "{} is out of stock",
                product.name
            )));
        }

        let existing = Self::find_line(&txn, cart.id, product_id).await?;
        let requested = existing.as_ref().map(|l| l.quantity).unwrap_or(0) + quantity;
        ensure_in_stock(&product, requested)?;

        match existing {
            Some(line) => {
                let mut line: cart_item::ActiveModel = line.into();
                line.quantity = Set(requested);
                line.update(&txn).await?;
            }
            None => {
                cart_item::ActiveModel {
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    snapshot_price: Set(round_money(product.effective_price())),
                    added_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }

        touch(&txn, cart).await?;
        txn.commit().await?;

        info!(user_id, product_id, quantity = requested, "Cart line updated");
        self.get_active_cart_lines(user_id).await
    }

    /// Sets a line's quantity and re-syncs its snapshot price. Zero removes the line.
    #[instrument(skip(self))]
    pub async fn set_item_quantity(
        &self,
        user_id: i32,
        product_id: i32,
        quantity: i32,
    ) -> Result<CartSnapshot, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "quantity must not be negative".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let cart = Self::find_or_create_active_cart(&txn, user_id).await?;
        let line = Self::find_line(&txn, cart.id, product_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        if quantity == 0 {
            CartItem::delete_by_id(line.id).exec(&txn).await?;
        } else {
            let product = PricingService::active_product(&txn, product_id).await?;
            ensure_in_stock(&product, quantity)?;

            let mut line: cart_item::ActiveModel = line.into();
            line.quantity = Set(quantity);
            line.snapshot_price = Set(round_money(product.effective_price()));
            line.update(&txn).await?;
        }

        touch(&txn, cart).await?;
        txn.commit().await?;
        self.get_active_cart_lines(user_id).await
    }

    /// Removes a product's line from the active cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: i32,
        product_id: i32,
    ) -> Result<CartSnapshot, ServiceError> {
        self.set_item_quantity(user_id, product_id, 0).await
    }

    /// Deletes every line; the cart itself stays active.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: i32) -> Result<CartSnapshot, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = Self::find_or_create_active_cart(&txn, user_id).await?;
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        touch(&txn, cart).await?;
        txn.commit().await?;
        self.get_active_cart_lines(user_id).await
    }

    /// Finds the user's active cart or opens a new one.
    ///
    /// `uq_carts_user_active` allows one open cart per user; a concurrent opener that
    /// loses the insert race picks up the winner's cart.
    pub async fn find_or_create_active_cart<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
    ) -> Result<cart::Model, ServiceError> {
        if let Some(cart) = find_active_cart(conn, user_id).await? {
            return Ok(cart);
        }

        if User::find_by_id(user_id).one(conn).await?.is_none() {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }

        let now = Utc::now();
        let opened = Cart::insert(cart::ActiveModel {
            user_id: Set(user_id),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        })
        .on_conflict(OnConflict::new().do_nothing().to_owned())
        .exec_without_returning(conn)
        .await?;

        let cart = find_active_cart(conn, user_id).await?.ok_or_else(|| {
            ServiceError::InternalError(format!("active cart for user {} vanished", user_id))
        })?;
        if opened > 0 {
            info!(user_id, cart_id = cart.id, "Opened new cart");
        }
        Ok(cart)
    }

    /// Lines of one cart, newest first, joined with their products.
    pub async fn load_lines<C: ConnectionTrait>(
        conn: &C,
        cart_id: i32,
    ) -> Result<Vec<CartLine>, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .find_also_related(Product)
            .order_by_desc(cart_item::Column::AddedAt)
            .order_by_desc(cart_item::Column::Id)
            .all(conn)
            .await?;

        rows.into_iter()
            .map(|(item, product)| {
                let product = product.ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
                Ok(CartLine {
                    product_id: item.product_id,
                    name: product.name.clone(),
                    sku: product.sku.clone(),
                    image_url: product.image_url.clone(),
                    stock: product.stock,
                    quantity: item.quantity,
                    snapshot_price: item.snapshot_price,
                    effective_price: round_money(product.effective_price()),
                })
            })
            .collect()
    }

    async fn find_line<C: ConnectionTrait>(
        conn: &C,
        cart_id: i32,
        product_id: i32,
    ) -> Result<Option<cart_item::Model>, ServiceError> {
        Ok(CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(conn)
            .await?)
    }
}

fn ensure_in_stock(product: &product::Model, quantity: i32) -> Result<(), ServiceError> {
    if quantity > product.stock {
        return Err(ServiceError::ValidationError(format!(
            "Only {} units of {} available",
            product.stock, product.name
        )));
    }
    Ok(())
}

async fn find_active_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> Result<Option<cart::Model>, ServiceError> {
    Ok(Cart::find()
        .filter(cart::Column::UserId.eq(user_id))
        .filter(cart::Column::IsActive.eq(true))
        .order_by_asc(cart::Column::Id)
        .one(conn)
        .await?)
}

async fn touch<C: ConnectionTrait>(conn: &C, cart: cart::Model) -> Result<(), ServiceError> {
    let mut cart: cart::ActiveModel = cart.into();
    cart.updated_at = Set(Utc::now());
    cart.update(conn).await?;
    Ok(())
}
