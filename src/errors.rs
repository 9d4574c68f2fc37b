use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "error": "Internal Server Error",
    "message": "Payment was approved but the order could not be recorded",
    "canFinalize": true,
    "reference": "TX123",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Payment Required")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Gateway-supplied detail for declines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Present when an approved charge can still be finalized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_finalize: Option<bool>,
    /// Gateway reference of the approved charge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payment declined: {message}")]
    Declined {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The charge went through but the order could not be recorded.
    #[error("Order persistence failed after approved charge {reference}: {message}")]
    PersistenceFailure { reference: String, message: String },

    #[error("Notification failed: {0}")]
    NotifierFailure(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Wraps any error raised after an approved charge so the caller keeps the reference.
    pub fn persistence_failure(reference: impl Into<String>, cause: &ServiceError) -> Self {
        ServiceError::PersistenceFailure {
            reference: reference.into(),
            message: cause.to_string(),
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) | Self::EmptyCart => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Declined { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PersistenceFailure { .. }
            | Self::NotifierFailure(_)
            | Self::DatabaseError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::NotifierFailure(_) => {
                "Internal server error".to_string()
            }
            Self::PersistenceFailure { .. } => {
                "Payment was approved but the order could not be recorded".to_string()
            }
            Self::Declined { message, .. } => message.clone(),
            Self::GatewayUnavailable(_) => "Payment gateway unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.response_message();

        let mut body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            details: None,
            can_finalize: None,
            reference: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        match self {
            ServiceError::Declined { details, .. } => body.details = details,
            ServiceError::PersistenceFailure { reference, .. } => {
                body.can_finalize = Some(true);
                body.reference = Some(reference);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
