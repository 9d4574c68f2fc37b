use crate::{
    errors::ServiceError,
    handlers::common::{
        created_response, no_content_response, opt_string_or_number, required_field,
        success_response, ValidJson,
    },
    services::{
        card_vault::CardDetails,
        payment_methods::{SaveMethodInput, StoredMethodView, UpdateMethodInput},
    },
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Creates the router for stored payment method endpoints
pub fn payment_method_routes() -> Router<AppState> {
    Router::new()
        .route("/sim", post(save_simulated_method))
        .route("/:id", put(update_method).delete(delete_method))
        .route("/user/:user_id", get(list_user_methods))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveMethodRequest {
    #[validate(range(min = 1))]
    pub user_id: i32,
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
    #[validate(length(max = 120))]
    pub holder_name: Option<String>,
    #[validate(length(max = 60))]
    pub alias: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMethodRequest {
    pub user_id: Option<i32>,
    #[validate(length(max = 60))]
    pub alias: Option<String>,
    #[validate(length(max = 120))]
    pub holder_name: Option<String>,
    pub is_default: Option<bool>,
}

/// Store a card flagged as simulated, for demo and test accounts
#[utoipa::path(
    post,
    path = "/api/payments/methods/sim",
    request_body = SaveMethodRequest,
    responses(
        (status = 201, description = "Payment method stored", body = StoredMethodView),
        (status = 400, description = "Invalid card data", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Payment methods"
)]
pub async fn save_simulated_method(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<SaveMethodRequest>,
) -> Result<Response, ServiceError> {
    let card = CardDetails::new(
        &required_field(payload.card_number, "cardNumber")?,
        &required_field(payload.exp_month, "expMonth")?,
        &required_field(payload.exp_year, "expYear")?,
        &required_field(payload.cvv, "cvv")?,
        payload.holder_name,
    );

    let method = state
        .services
        .payment_methods
        .save_card(
            payload.user_id,
            &card,
            SaveMethodInput {
                alias: payload.alias,
                make_default: payload.is_default,
                simulated: true,
            },
        )
        .await?;
    Ok(created_response(method))
}

/// Edit alias, holder name or default flag; card data cannot change
#[utoipa::path(
    put,
    path = "/api/payments/methods/:id",
    params(("id" = i32, Path, description = "Payment method ID")),
    request_body = UpdateMethodRequest,
    responses(
        (status = 200, description = "Payment method updated", body = StoredMethodView),
        (status = 400, description = "Method belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Payment method not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Payment methods"
)]
pub async fn update_method(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidJson(payload): ValidJson<UpdateMethodRequest>,
) -> Result<Response, ServiceError> {
    let method = state
        .services
        .payment_methods
        .update(
            id,
            UpdateMethodInput {
                user_id: payload.user_id,
                alias: payload.alias,
                holder_name: payload.holder_name,
                is_default: payload.is_default,
            },
        )
        .await?;
    Ok(success_response(method))
}

#[utoipa::path(
    delete,
    path = "/api/payments/methods/:id",
    params(("id" = i32, Path, description = "Payment method ID")),
    responses(
        (status = 204, description = "Payment method deleted"),
        (status = 404, description = "Payment method not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Payment methods"
)]
pub async fn delete_method(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    state.services.payment_methods.delete(id).await?;
    Ok(no_content_response())
}

/// List a user's stored methods, default first
#[utoipa::path(
    get,
    path = "/api/payments/methods/user/:user_id",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Stored payment methods", body = [StoredMethodView])
    ),
    tag = "Payment methods"
)]
pub async fn list_user_methods(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Response, ServiceError> {
    let methods = state.services.payment_methods.list_for_user(user_id).await?;
    Ok(success_response(methods))
}
