use crate::{
    errors::ServiceError,
    handlers::common::{opt_string_or_number, required_field, success_response, ValidJson},
    services::{
        card_vault::CardDetails,
        commerce::{
            CheckoutInput, CheckoutOutcome, FinalizeInput, PaymentSource, SimulatedCheckoutInput,
        },
    },
    AppState,
};
use axum::{extract::State, response::Response, routing::post, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

/// Creates the router for checkout and direct charge endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/checkout-sim", post(checkout_simulated))
        .route("/finalize", post(finalize))
        .route("/card", post(charge_card))
}

/// Checkout body. Either the card fields or `savedMethodId` must be present.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(required, range(min = 1))]
    pub user_id: Option<i32>,
    pub card_number: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    #[schema(value_type = Option<String>, example = "07")]
    pub exp_month: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    #[schema(value_type = Option<String>, example = "2030")]
    pub exp_year: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    #[schema(value_type = Option<String>)]
    pub cvv: Option<String>,
    pub holder_name: Option<String>,
    #[serde(default)]
    pub save_method: bool,
    pub saved_method_id: Option<i32>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[serde(alias = "direccionEnvio")]
    #[validate(length(max = 500))]
    pub shipping_address: Option<String>,
    #[serde(alias = "observaciones")]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl CheckoutRequest {
    fn into_input(self) -> Result<CheckoutInput, ServiceError> {
        let source = match self.saved_method_id {
            Some(method_id) => PaymentSource::SavedMethod(method_id),
            None => PaymentSource::Card {
                card: CardDetails::new(
                    &required_field(self.card_number, "cardNumber")?,
                    &required_field(self.exp_month, "expMonth")?,
                    &required_field(self.exp_year, "expYear")?,
                    &required_field(self.cvv, "cvv")?,
                    self.holder_name,
                ),
                save: self.save_method,
            },
        };

        Ok(CheckoutInput {
            user_id: self.user_id.unwrap_or_default(),
            source,
            currency: self.currency,
            shipping_address: self.shipping_address,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    #[validate(required, range(min = 1))]
    pub user_id: Option<i32>,
    #[validate(required, length(min = 1, max = 255))]
    pub reference: Option<String>,
    #[serde(alias = "direccionEnvio")]
    #[validate(length(max = 500))]
    pub shipping_address: Option<String>,
    #[serde(alias = "observaciones")]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardChargeRequest {
    pub card_number: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    #[schema(value_type = Option<String>)]
    pub exp_month: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    #[schema(value_type = Option<String>)]
    pub exp_year: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    #[schema(value_type = Option<String>)]
    pub cvv: Option<String>,
    pub holder_name: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>, example = 49.99)]
    pub amount: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

/// Charge the user's cart through the gateway and record the order
#[utoipa::path(
    post,
    path = "/api/payments/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Charge approved and order recorded", body = CheckoutOutcome),
        (status = 400, description = "Invalid request or empty cart", body = crate::errors::ErrorResponse),
        (status = 402, description = "Payment declined", body = crate::errors::ErrorResponse),
        (status = 500, description = "Charge approved but order not recorded; finalize with the reference", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CheckoutRequest>,
) -> Result<Response, ServiceError> {
    let input = payload.into_input()?;
    let outcome = state.services.checkout.checkout(input).await?;
    Ok(success_response(outcome))
}

/// Approve the cart locally without calling the gateway
#[utoipa::path(
    post,
    path = "/api/payments/checkout-sim",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Simulated payment approved and order recorded", body = CheckoutOutcome),
        (status = 400, description = "Invalid request or empty cart", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product no longer available", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn checkout_simulated(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CheckoutRequest>,
) -> Result<Response, ServiceError> {
    let outcome = state
        .services
        .checkout
        .checkout_simulated(SimulatedCheckoutInput {
            user_id: payload.user_id.unwrap_or_default(),
            shipping_address: payload.shipping_address,
            notes: payload.notes,
        })
        .await?;
    Ok(success_response(outcome))
}

/// Record the order for a charge that was approved but never persisted
#[utoipa::path(
    post,
    path = "/api/payments/finalize",
    request_body = FinalizeRequest,
    responses(
        (status = 200, description = "Order recorded for the approved charge", body = CheckoutOutcome),
        (status = 400, description = "Invalid request or empty cart", body = crate::errors::ErrorResponse),
        (status = 409, description = "Reference already recorded", body = crate::errors::ErrorResponse),
        (status = 500, description = "Order could not be recorded; retry finalize", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn finalize(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<FinalizeRequest>,
) -> Result<Response, ServiceError> {
    let outcome = state
        .services
        .checkout
        .finalize(FinalizeInput {
            user_id: payload.user_id.unwrap_or_default(),
            reference: payload.reference.unwrap_or_default(),
            shipping_address: payload.shipping_address,
            notes: payload.notes,
        })
        .await?;
    Ok(success_response(outcome))
}

/// Charge a card directly, outside any cart
#[utoipa::path(
    post,
    path = "/api/payments/card",
    request_body = CardChargeRequest,
    responses(
        (status = 200, description = "Gateway approval body, passed through unchanged"),
        (status = 400, description = "Invalid card or amount", body = crate::errors::ErrorResponse),
        (status = 402, description = "Payment declined", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn charge_card(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CardChargeRequest>,
) -> Result<Response, ServiceError> {
    let card = CardDetails::new(
        &required_field(payload.card_number, "cardNumber")?,
        &required_field(payload.exp_month, "expMonth")?,
        &required_field(payload.exp_year, "expYear")?,
        &required_field(payload.cvv, "cvv")?,
        payload.holder_name,
    );
    let amount = payload
        .amount
        .ok_or_else(|| ServiceError::ValidationError("amount is required".to_string()))?;

    let body = state
        .services
        .checkout
        .charge_card(card, amount, payload.currency, payload.description)
        .await?;
    info!(%amount, "Direct card charge approved");
    Ok(success_response(body))
}
