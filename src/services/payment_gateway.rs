use crate::{
    errors::ServiceError,
    services::{card_vault::CardDetails, commerce::pricing_service::round_money},
};
use async_trait::async_trait;
use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// A single card charge.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub card: CardDetails,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub description: String,
}

/// An approved charge.
#[derive(Debug, Clone)]
pub struct ChargeApproval {
    /// Gateway-assigned reference, the anchor for finalize
    pub reference: String,
    pub raw: Value,
}

/// Outbound card-charging API.
///
/// Implementations never retry: a charge is not safe to repeat blindly.
/// Explicit refusals are `Declined`; transport, timeout and protocol
/// problems are `GatewayUnavailable`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeApproval, ServiceError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CardChargeBody<'a> {
    card_number: &'a str,
    exp_month: &'a str,
    exp_year: &'a str,
    cvv: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    currency: Option<&'a str>,
    description: &'a str,
    merchant_name: &'a str,
}

/// JSON-over-HTTPS gateway client posting to `{base_url}/card`.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    endpoint: String,
    merchant_name: String,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: &str,
        merchant_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("gateway client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/card", base_url.trim_end_matches('/')),
            merchant_name: merchant_name.into(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(amount = %request.amount, last4 = %request.card.last4()))]
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeApproval, ServiceError> {
        let body = CardChargeBody {
            card_number: &request.card.card_number,
            exp_month: &request.card.exp_month,
            exp_year: &request.card.exp_year,
            cvv: &request.card.cvv,
            amount: round_money(request.amount),
            currency: request.currency.as_deref(),
            description: &request.description,
            merchant_name: &self.merchant_name,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                counter!("storefront_gateway.unavailable", 1);
                let kind = if e.is_timeout() { "timed out" } else { "unreachable" };
                error!(error = %e, "Payment gateway {}", kind);
                ServiceError::GatewayUnavailable(format!("gateway {}", kind))
            })?;

        let status = response.status();
        if status.is_server_error() {
            counter!("storefront_gateway.unavailable", 1);
            error!(%status, "Payment gateway returned a server error");
            return Err(ServiceError::GatewayUnavailable(format!(
                "gateway responded {}",
                status
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            counter!("storefront_gateway.unavailable", 1);
            error!(error = %e, %status, "Payment gateway sent an unreadable body");
            ServiceError::GatewayUnavailable("malformed gateway response".to_string())
        })?;

        interpret_response(status.is_success(), payload)
    }
}

/// Turns a decoded gateway body into an approval or a decline.
pub fn interpret_response(http_ok: bool, payload: Value) -> Result<ChargeApproval, ServiceError> {
    let approved = http_ok && payload.get("status").and_then(Value::as_str) == Some("approved");

    if !approved {
        counter!("storefront_gateway.declined", 1);
        let message = ["message", "error", "reason"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_str))
            .unwrap_or("Payment declined")
            .to_string();
        warn!(%message, "Charge declined");
        return Err(ServiceError::Declined {
            message,
            details: Some(payload),
        });
    }

    let reference = match extract_reference(&payload) {
        Some(reference) => reference,
        None => {
            let synthesized = format!("UNREF-{}", Uuid::new_v4().simple());
            warn!(reference = %synthesized, "Approved charge carried no reference; synthesized one");
            synthesized
        }
    };

    counter!("storefront_gateway.approved", 1);
    info!(%reference, "Charge approved");
    Ok(ChargeApproval {
        reference,
        raw: payload,
    })
}

/// `reference`, then `id`, then `tx`; numbers are accepted and stringified.
fn extract_reference(payload: &Value) -> Option<String> {
    ["reference", "id", "tx"].iter().find_map(|key| match payload.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
