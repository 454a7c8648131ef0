//! Typed client for the payment provider.
//!
//! Confirms a payment session by its client secret. A declined payment is
//! data ([`ConfirmOutcome::Declined`]), not an `Err`: the checkout flow
//! must keep all entered state so the buyer can retry, so only transport
//! and contract failures surface as [`PaymentError`].

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use crate::config::PaymentConfig;

/// Errors that can occur when talking to the payment API.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// HTTP request failed (network, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected contract.
    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The API rejected the request for a non-payment reason.
    #[error("payment API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The client secret does not look like `<intent>_secret_<nonce>`.
    #[error("malformed client secret")]
    MalformedClientSecret,
}

/// A declined payment, carried as data so the UI can display it inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDecline {
    /// Machine-readable decline code (e.g. `card_declined`).
    pub code: String,
    /// Human-readable message for the buyer.
    pub message: String,
}

/// Result of a confirmation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Payment authorized; the cart can be completed.
    Confirmed {
        /// The provider's payment intent ID.
        confirmation_id: String,
    },
    /// Payment declined; the buyer can retry with another instrument.
    Declined(PaymentDecline),
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: String,
    #[serde(default)]
    last_payment_error: Option<IntentError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IntentError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeclineEnvelope {
    #[serde(default)]
    error: IntentError,
}

/// Client for the payment provider's API.
#[derive(Clone)]
pub struct PaymentClient {
    inner: Arc<PaymentClientInner>,
}

struct PaymentClientInner {
    http: reqwest::Client,
    base_url: String,
    secret_key: SecretString,
}

impl PaymentClient {
    /// Create a new payment API client.
    #[must_use]
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            inner: Arc::new(PaymentClientInner {
                http: reqwest::Client::new(),
                base_url: config.api_url.as_str().trim_end_matches('/').to_owned(),
                secret_key: config.secret_key.clone(),
            }),
        }
    }

    /// Confirm the payment session identified by `client_secret`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] for transport or contract failures.
    /// Declines are `Ok(ConfirmOutcome::Declined(..))`, not errors.
    #[instrument(skip_all)]
    pub async fn confirm(&self, client_secret: &str) -> Result<ConfirmOutcome, PaymentError> {
        let intent_id = intent_id_of(client_secret)?;
        let url = format!(
            "{}/v1/payment_intents/{intent_id}/confirm",
            self.inner.base_url
        );

        let response = self
            .inner
            .http
            .post(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .json(&serde_json::json!({ "client_secret": client_secret }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        // Declines come back as a 402 with an error envelope.
        if status == reqwest::StatusCode::PAYMENT_REQUIRED {
            let envelope: DeclineEnvelope = serde_json::from_str(&text)?;
            return Ok(ConfirmOutcome::Declined(decline_of(envelope.error)));
        }

        if !status.is_success() {
            tracing::debug!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "payment API returned non-success status"
            );
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        let intent: IntentResponse = serde_json::from_str(&text)?;
        match intent.status.as_str() {
            "succeeded" | "processing" => Ok(ConfirmOutcome::Confirmed {
                confirmation_id: intent.id,
            }),
            _ => Ok(ConfirmOutcome::Declined(decline_of(
                intent.last_payment_error.unwrap_or_default(),
            ))),
        }
    }
}

/// Client secrets look like `pi_123_secret_456`; the part before
/// `_secret_` is the intent ID.
fn intent_id_of(client_secret: &str) -> Result<&str, PaymentError> {
    client_secret
        .split_once("_secret_")
        .map(|(intent_id, _)| intent_id)
        .filter(|intent_id| !intent_id.is_empty())
        .ok_or(PaymentError::MalformedClientSecret)
}

fn decline_of(error: IntentError) -> PaymentDecline {
    PaymentDecline {
        code: error.code.unwrap_or_else(|| "payment_failed".to_owned()),
        message: error
            .message
            .unwrap_or_else(|| "Your payment could not be processed.".to_owned()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_id_of() {
        assert_eq!(intent_id_of("pi_123_secret_456").unwrap(), "pi_123");
        assert!(matches!(
            intent_id_of("pi_123"),
            Err(PaymentError::MalformedClientSecret)
        ));
        assert!(matches!(
            intent_id_of("_secret_456"),
            Err(PaymentError::MalformedClientSecret)
        ));
    }

    #[test]
    fn test_decline_defaults() {
        let decline = decline_of(IntentError::default());
        assert_eq!(decline.code, "payment_failed");
        assert!(!decline.message.is_empty());
    }

    #[test]
    fn test_decline_passthrough() {
        let decline = decline_of(IntentError {
            code: Some("card_declined".to_owned()),
            message: Some("Your card was declined.".to_owned()),
        });
        assert_eq!(decline.code, "card_declined");
        assert_eq!(decline.message, "Your card was declined.");
    }
}
