use crate::{
    entities::{payment, Payment, PaymentMethodKind},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        card_vault::CardDetails,
        commerce::{
            cart_service::{CartService, CartSnapshot},
            order_materializer::{MaterializeRequest, MaterializedOrder, OrderMaterializer},
            pricing_service::{line_subtotal, order_total, PricingService},
        },
        payment_gateway::{ChargeRequest, PaymentGateway},
        payment_methods::{PaymentMethodService, SaveMethodInput},
    },
};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Where the money comes from.
#[derive(Debug, Clone)]
pub enum PaymentSource {
    Card { card: CardDetails, save: bool },
    SavedMethod(i32),
}

#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub user_id: i32,
    pub source: PaymentSource,
    pub currency: Option<String>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SimulatedCheckoutInput {
    pub user_id: i32,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FinalizeInput {
    pub user_id: i32,
    pub reference: String,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

/// Successful checkout or finalize.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    #[schema(example = "approved")]
    pub status: String,
    pub order_id: i32,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 100.0)]
    pub total: Decimal,
}

impl From<&MaterializedOrder> for CheckoutOutcome {
    fn from(order: &MaterializedOrder) -> Self {
        Self {
            status: "approved".to_string(),
            order_id: order.order_id,
            total: order.total,
        }
    }
}

/// Orchestrates charge-then-persist checkout and its recovery path.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    carts: CartService,
    pricing: PricingService,
    materializer: OrderMaterializer,
    payment_methods: PaymentMethodService,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Arc<EventSender>,
    default_currency: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        payment_methods: PaymentMethodService,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
        default_currency: String,
    ) -> Self {
        Self {
            carts: CartService::new(db.clone()),
            pricing: PricingService::new(db.clone()),
            materializer: OrderMaterializer::new(db.clone()),
            db,
            payment_methods,
            gateway,
            event_sender,
            default_currency,
        }
    }

    /// Charges the cart total through the gateway, then materializes the order.
    ///
    /// Once the gateway has approved, any failure to persist comes back as
    /// `PersistenceFailure` carrying the reference, so the caller can finalize
    /// instead of paying twice.
    #[instrument(skip(self, input), fields(user_id = input.user_id))]
    pub async fn checkout(&self, input: CheckoutInput) -> Result<CheckoutOutcome, ServiceError> {
        let (snapshot, total) = self.priced_cart(input.user_id).await?;
        let cart_id = snapshot.cart_id;

        let (card, card_to_save) = match input.source {
            PaymentSource::SavedMethod(method_id) => {
                let (method, card) = self
                    .payment_methods
                    .load_card(input.user_id, method_id)
                    .await?;
                if method.is_simulated {
                    return Err(ServiceError::ValidationError(
                        "Simulated payment methods can only be used with checkout-sim".to_string(),
                    ));
                }
                (card, None)
            }
            PaymentSource::Card { card, save } => {
                card.validate()?;
                let to_save = save.then(|| card.clone());
                (card, to_save)
            }
        };

        let approval = self
            .gateway
            .charge(&ChargeRequest {
                card,
                amount: total,
                currency: Some(input.currency.unwrap_or_else(|| self.default_currency.clone())),
                description: format!("cart {} user {}", cart_id, input.user_id),
            })
            .await
            .map_err(|err| {
                match &err {
                    ServiceError::Declined { .. } => counter!("storefront_checkout.declined", 1),
                    _ => counter!("storefront_checkout.gateway_errors", 1),
                }
                err
            })?;

        let order = self
            .materializer
            .materialize(MaterializeRequest {
                user_id: input.user_id,
                cart_id,
                lines: snapshot.items,
                gateway_reference: approval.reference.clone(),
                method: PaymentMethodKind::Card,
                charged_amount: Some(total),
                shipping_address: input.shipping_address,
                notes: input
                    .notes
                    .or_else(|| Some(format!("Card payment approved ({})", approval.reference))),
            })
            .await
            .map_err(|err| {
                counter!("storefront_checkout.persistence_failures", 1);
                error!(
                    reference = %approval.reference,
                    error = %err,
                    "Charge approved but order not recorded; finalize with this reference"
                );
                ServiceError::persistence_failure(&approval.reference, &err)
            })?;

        if let Some(card) = card_to_save {
            if let Err(err) = self
                .payment_methods
                .save_card(input.user_id, &card, SaveMethodInput::default())
                .await
            {
                warn!(error = %err, "Order placed but card could not be saved");
            }
        }

        self.publish_sale(input.user_id, &order);
        counter!("storefront_checkout.approved", 1);
        info!(order_id = order.order_id, total = %order.total, "Checkout approved");
        Ok(CheckoutOutcome::from(&order))
    }

    /// Checkout without a gateway call, approved locally with a generated reference.
    #[instrument(skip(self, input), fields(user_id = input.user_id))]
    pub async fn checkout_simulated(
        &self,
        input: SimulatedCheckoutInput,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let (snapshot, total) = self.priced_cart(input.user_id).await?;
        let reference = format!("SIM-{}", Uuid::new_v4().simple());

        let order = self
            .materializer
            .materialize(MaterializeRequest {
                user_id: input.user_id,
                cart_id: snapshot.cart_id,
                lines: snapshot.items,
                gateway_reference: reference,
                method: PaymentMethodKind::Simulated,
                charged_amount: Some(total),
                shipping_address: input.shipping_address,
                notes: input
                    .notes
                    .or_else(|| Some("Simulated payment approved".to_string())),
            })
            .await?;

        self.publish_sale(input.user_id, &order);
        counter!("storefront_checkout.simulated", 1);
        info!(order_id = order.order_id, "Simulated checkout approved");
        Ok(CheckoutOutcome::from(&order))
    }

    /// Records an order for a charge the gateway already approved. Never charges.
    ///
    /// Works from the user's current cart; once a finalize succeeds the cart is
    /// closed, so repeating it yields `EmptyCart` rather than a second order.
    #[instrument(skip(self, input), fields(user_id = input.user_id, reference = %input.reference))]
    pub async fn finalize(&self, input: FinalizeInput) -> Result<CheckoutOutcome, ServiceError> {
        let reference = input.reference.trim().to_string();
        if reference.is_empty() {
            return Err(ServiceError::ValidationError(
                "reference is required".to_string(),
            ));
        }

        let (snapshot, _) = self.priced_cart(input.user_id).await?;

        if let Some(existing) = Payment::find()
            .filter(payment::Column::GatewayReference.eq(reference.as_str()))
            .one(&*self.db)
            .await?
        {
            return Err(ServiceError::Conflict(format!(
                "Reference {} already recorded for order {}",
                reference, existing.order_id
            )));
        }

        let order = self
            .materializer
            .materialize(MaterializeRequest {
                user_id: input.user_id,
                cart_id: snapshot.cart_id,
                lines: snapshot.items,
                gateway_reference: reference.clone(),
                method: PaymentMethodKind::Card,
                charged_amount: None,
                shipping_address: input.shipping_address,
                notes: input
                    .notes
                    .or_else(|| Some(format!("Card payment approved ({}) (finalize)", reference))),
            })
            .await
            .map_err(|err| match err {
                ServiceError::DatabaseError(_) => {
                    counter!("storefront_checkout.persistence_failures", 1);
                    error!(%reference, error = %err, "Finalize could not record the order");
                    ServiceError::persistence_failure(&reference, &err)
                }
                other => other,
            })?;

        self.publish_sale(input.user_id, &order);
        counter!("storefront_checkout.finalized", 1);
        info!(order_id = order.order_id, "Approved charge finalized");
        Ok(CheckoutOutcome::from(&order))
    }

    /// Charges a card directly, outside any cart, returning the gateway's body.
    #[instrument(skip(self, card), fields(amount = %amount))]
    pub async fn charge_card(
        &self,
        card: CardDetails,
        amount: Decimal,
        currency: Option<String>,
        description: Option<String>,
    ) -> Result<Value, ServiceError> {
        card.validate()?;
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "amount must be greater than zero".to_string(),
            ));
        }

        let approval = self
            .gateway
            .charge(&ChargeRequest {
                card,
                amount,
                currency: Some(currency.unwrap_or_else(|| self.default_currency.clone())),
                description: description.unwrap_or_else(|| "Direct card charge".to_string()),
            })
            .await?;
        Ok(approval.raw)
    }

    /// Reads the cart and prices every line before anything is charged.
    async fn priced_cart(&self, user_id: i32) -> Result<(CartSnapshot, Decimal), ServiceError> {
        if user_id <= 0 {
            return Err(ServiceError::ValidationError(
                "userId is required".to_string(),
            ));
        }

        let snapshot = self.carts.get_active_cart_lines(user_id).await?;
        if snapshot.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut subtotals = Vec::with_capacity(snapshot.items.len());
        for line in &snapshot.items {
            let price = self.pricing.effective_price(line.product_id).await?;
            subtotals.push(line_subtotal(line.quantity, price));
        }
        let total = order_total(subtotals);

        if total <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Cart total must be greater than zero".to_string(),
            ));
        }
        Ok((snapshot, total))
    }

    fn publish_sale(&self, user_id: i32, order: &MaterializedOrder) {
        self.event_sender.send_or_log(Event::SaleApproved {
            user_id,
            order_id: order.order_id,
            total: order.total,
            lines: order.lines.clone(),
        });
    }
}
