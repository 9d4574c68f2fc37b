use crate::errors::ServiceError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::Validate;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// JSON body that has been deserialized and validated.
///
/// Malformed bodies surface as `ValidationError` (400) instead of axum's default rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Accepts `"07"`, `7` or `null` for fields clients send either way (expiry month/year, cvv).
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string()).filter(|s| !s.is_empty())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Returns the value of a field that is required for this particular request shape.
pub fn required_field(value: Option<String>, name: &str) -> Result<String, ServiceError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ServiceError::ValidationError(format!("{} is required", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Expiry {
        #[serde(default, deserialize_with = "opt_string_or_number")]
        month: Option<String>,
    }

    #[test]
    fn month_accepts_strings_and_numbers() {
        let from_str: Expiry = serde_json::from_str(r#"{"month":"07"}"#).unwrap();
        let from_num: Expiry = serde_json::from_str(r#"{"month":7}"#).unwrap();
        let missing: Expiry = serde_json::from_str("{}").unwrap();
        let null: Expiry = serde_json::from_str(r#"{"month":null}"#).unwrap();

        assert_eq!(from_str.month.as_deref(), Some("07"));
        assert_eq!(from_num.month.as_deref(), Some("7"));
        assert_eq!(missing.month, None);
        assert_eq!(null.month, None);
    }

    #[test]
    fn month_rejects_objects() {
        assert!(serde_json::from_str::<Expiry>(r#"{"month":{"m":7}}"#).is_err());
    }

    #[test]
    fn required_field_rejects_blank() {
        assert!(required_field(Some("  ".into()), "cvv").is_err());
        assert!(required_field(None, "cvv").is_err());
        assert_eq!(required_field(Some("123".into()), "cvv").unwrap(), "123");
    }
}
