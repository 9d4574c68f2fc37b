use crate::errors::ServiceError;
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Cleartext card data as entered by the customer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub card_number: String,
    pub exp_month: String,
    pub exp_year: String,
    pub cvv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("last4", &self.last4())
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .finish_non_exhaustive()
    }
}

impl CardDetails {
    /// Trims the fields and drops spaces/dashes from the number.
    pub fn new(
        card_number: &str,
        exp_month: &str,
        exp_year: &str,
        cvv: &str,
        holder_name: Option<String>,
    ) -> Self {
        Self {
            card_number: card_number
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '-')
                .collect(),
            exp_month: exp_month.trim().to_string(),
            exp_year: exp_year.trim().to_string(),
            cvv: cvv.trim().to_string(),
            holder_name: holder_name.filter(|h| !h.trim().is_empty()),
        }
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

        if !all_digits(&self.card_number) || !(12..=19).contains(&self.card_number.len()) {
            return Err(ServiceError::ValidationError(
                "cardNumber must be 12 to 19 digits".to_string(),
            ));
        }
        match self.exp_month.parse::<u8>() {
            Ok(month) if (1..=12).contains(&month) && all_digits(&self.exp_month) => {}
            _ => {
                return Err(ServiceError::ValidationError(
                    "expMonth must be between 1 and 12".to_string(),
                ))
            }
        }
        if !all_digits(&self.exp_year) || !matches!(self.exp_year.len(), 2 | 4) {
            return Err(ServiceError::ValidationError(
                "expYear must have 2 or 4 digits".to_string(),
            ));
        }
        if !all_digits(&self.cvv) || !matches!(self.cvv.len(), 3 | 4) {
            return Err(ServiceError::ValidationError(
                "cvv must have 3 or 4 digits".to_string(),
            ));
        }
        Ok(())
    }

    /// Last four characters of the number, counted by char so unvalidated input is safe.
    pub fn last4(&self) -> String {
        let mut tail: Vec<char> = self.card_number.chars().rev().take(4).collect();
        tail.reverse();
        tail.into_iter().collect()
    }

    /// Two-digit month, e.g. "07".
    pub fn normalized_month(&self) -> String {
        match self.exp_month.parse::<u8>() {
            Ok(month) => format!("{:02}", month),
            Err(_) => self.exp_month.clone(),
        }
    }

    /// Four-digit year; "27" becomes "2027".
    pub fn normalized_year(&self) -> String {
        if self.exp_year.len() == 2 {
            format!("20{}", self.exp_year)
        } else {
            self.exp_year.clone()
        }
    }
}

/// Seals card data with AES-256-GCM.
///
/// The stored form is `base64(nonce || ciphertext || tag)`. The owning user id is
/// bound as associated data, so a blob copied onto another user's row will not open.
#[derive(Clone)]
pub struct CardVault {
    cipher: Aes256Gcm,
}

impl CardVault {
    pub fn new(secret: &str) -> Result<Self, ServiceError> {
        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|_| ServiceError::InternalError("invalid card vault key".to_string()))?;
        Ok(Self { cipher })
    }

    pub fn seal(&self, user_id: i32, card: &CardDetails) -> Result<String, ServiceError> {
        let plaintext = serde_json::to_vec(card)
            .map_err(|e| ServiceError::InternalError(format!("card encoding failed: {}", e)))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let aad = user_id.to_be_bytes();
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| ServiceError::InternalError("card encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    pub fn open(&self, user_id: i32, sealed: &str) -> Result<CardDetails, ServiceError> {
        let unreadable = || ServiceError::InternalError("stored card could not be opened".to_string());

        let bytes = STANDARD.decode(sealed).map_err(|_| unreadable())?;
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(unreadable());
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);

        let aad = user_id.to_be_bytes();
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| unreadable())?;

        serde_json::from_slice(&plaintext).map_err(|_| unreadable())
    }
}
