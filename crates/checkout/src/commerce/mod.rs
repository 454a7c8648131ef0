//! Typed client for the remote commerce API.
//!
//! Uses `reqwest` for HTTP with JSON request/response bodies. Every remote
//! failure is translated into a [`CommerceError`] with a human-readable
//! message; raw response JSON never leaves this module untyped.

pub mod types;

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tidewater_core::{CartId, OrderId, ShippingOptionId, VariantId};
use tracing::instrument;

use crate::config::CommerceConfig;
use types::{
    CartEnvelope, CartUpdate, CompleteEnvelope, CompleteOutcome, OrderEnvelope, RemoteCart,
    RemoteOrder, ShippingOption, ShippingOptionsEnvelope,
};

/// Errors that can occur when talking to the commerce API.
#[derive(Debug, thiserror::Error)]
pub enum CommerceError {
    /// HTTP request failed (network, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected contract.
    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The API rejected the request.
    #[error("commerce API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Resource not found (expired cart, unknown order).
    #[error("not found: {0}")]
    NotFound(String),
}

/// Client for the commerce API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    http: reqwest::Client,
    base_url: String,
    publishable_key: String,
}

impl CommerceClient {
    /// Create a new commerce API client.
    #[must_use]
    pub fn new(config: &CommerceConfig) -> Self {
        Self {
            inner: Arc::new(CommerceClientInner {
                http: reqwest::Client::new(),
                base_url: config.api_url.as_str().trim_end_matches('/').to_owned(),
                publishable_key: config.publishable_key.clone(),
            }),
        }
    }

    /// Create a new remote cart in the given region.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn create_cart(&self, region_id: &str) -> Result<RemoteCart, CommerceError> {
        let body = serde_json::json!({ "region_id": region_id });
        let envelope: CartEnvelope = self.post("/store/carts", &body).await?;
        Ok(envelope.cart)
    }

    /// Retrieve an existing cart.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::NotFound`] for an expired or unknown ID.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn get_cart(&self, cart_id: &CartId) -> Result<RemoteCart, CommerceError> {
        let envelope: CartEnvelope = self.get(&format!("/store/carts/{cart_id}")).await?;
        Ok(envelope.cart)
    }

    /// Update cart-level fields (email, addresses).
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the update.
    #[instrument(skip(self, update), fields(cart_id = %cart_id))]
    pub async fn update_cart(
        &self,
        cart_id: &CartId,
        update: &CartUpdate,
    ) -> Result<RemoteCart, CommerceError> {
        let envelope: CartEnvelope = self.post(&format!("/store/carts/{cart_id}"), update).await?;
        Ok(envelope.cart)
    }

    /// Add a variant to the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the line item.
    #[instrument(skip(self), fields(cart_id = %cart_id, variant_id = %variant_id))]
    pub async fn add_line_item(
        &self,
        cart_id: &CartId,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<RemoteCart, CommerceError> {
        let body = serde_json::json!({ "variant_id": variant_id, "quantity": quantity });
        let envelope: CartEnvelope = self
            .post(&format!("/store/carts/{cart_id}/line-items"), &body)
            .await?;
        Ok(envelope.cart)
    }

    /// Change a line item's quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the update.
    #[instrument(skip(self), fields(cart_id = %cart_id, item_id = %item_id))]
    pub async fn update_line_item(
        &self,
        cart_id: &CartId,
        item_id: &str,
        quantity: u32,
    ) -> Result<RemoteCart, CommerceError> {
        let body = serde_json::json!({ "quantity": quantity });
        let envelope: CartEnvelope = self
            .post(&format!("/store/carts/{cart_id}/line-items/{item_id}"), &body)
            .await?;
        Ok(envelope.cart)
    }

    /// Remove a line item from the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id, item_id = %item_id))]
    pub async fn delete_line_item(
        &self,
        cart_id: &CartId,
        item_id: &str,
    ) -> Result<RemoteCart, CommerceError> {
        let url = format!(
            "{}/store/carts/{cart_id}/line-items/{item_id}",
            self.inner.base_url
        );
        let request = self
            .inner
            .http
            .delete(&url)
            .header("x-publishable-api-key", &self.inner.publishable_key);
        let envelope: CartEnvelope = Self::execute(request).await?;
        Ok(envelope.cart)
    }

    /// List shipping options for the cart's current address.
    ///
    /// Only meaningful once the cart has a country and postal code; the
    /// caller debounces rapid address edits before calling.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn list_shipping_options(
        &self,
        cart_id: &CartId,
    ) -> Result<Vec<ShippingOption>, CommerceError> {
        let envelope: ShippingOptionsEnvelope = self
            .get(&format!("/store/shipping-options/{cart_id}"))
            .await?;
        Ok(envelope.shipping_options)
    }

    /// Attach a shipping method to the cart.
    ///
    /// The cart must be refreshed afterward to observe the updated
    /// shipping total.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the option.
    #[instrument(skip(self), fields(cart_id = %cart_id, option_id = %option_id))]
    pub async fn add_shipping_method(
        &self,
        cart_id: &CartId,
        option_id: &ShippingOptionId,
    ) -> Result<RemoteCart, CommerceError> {
        let body = serde_json::json!({ "option_id": option_id });
        let envelope: CartEnvelope = self
            .post(&format!("/store/carts/{cart_id}/shipping-methods"), &body)
            .await?;
        Ok(envelope.cart)
    }

    /// Initialize payment sessions for all providers on the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn create_payment_sessions(
        &self,
        cart_id: &CartId,
    ) -> Result<RemoteCart, CommerceError> {
        let envelope: CartEnvelope = self
            .post(
                &format!("/store/carts/{cart_id}/payment-sessions"),
                &serde_json::json!({}),
            )
            .await?;
        Ok(envelope.cart)
    }

    /// Select which provider's session the cart will pay with.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the provider.
    #[instrument(skip(self), fields(cart_id = %cart_id, provider_id = %provider_id))]
    pub async fn select_payment_session(
        &self,
        cart_id: &CartId,
        provider_id: &str,
    ) -> Result<RemoteCart, CommerceError> {
        let body = serde_json::json!({ "provider_id": provider_id });
        let envelope: CartEnvelope = self
            .post(&format!("/store/carts/{cart_id}/payment-session"), &body)
            .await?;
        Ok(envelope.cart)
    }

    /// Exchange the cart for an order once payment is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the response does not
    /// match the completion contract.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn complete_cart(&self, cart_id: &CartId) -> Result<CompleteOutcome, CommerceError> {
        let envelope: CompleteEnvelope = self
            .post(
                &format!("/store/carts/{cart_id}/complete"),
                &serde_json::json!({}),
            )
            .await?;
        match envelope.kind.as_str() {
            "order" => Ok(CompleteOutcome::Order(serde_json::from_value(
                envelope.data,
            )?)),
            _ => Ok(CompleteOutcome::Cart(serde_json::from_value(
                envelope.data,
            )?)),
        }
    }

    /// Fetch a completed order by ID, for the receipt view.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::NotFound`] for an unknown order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<RemoteOrder, CommerceError> {
        let envelope: OrderEnvelope = self.get(&format!("/store/orders/{order_id}")).await?;
        Ok(envelope.order)
    }

    /// Fetch the order created from a completed cart.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::NotFound`] if the cart has no order yet.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn get_order_by_cart(&self, cart_id: &CartId) -> Result<RemoteOrder, CommerceError> {
        let envelope: OrderEnvelope = self.get(&format!("/store/orders/cart/{cart_id}")).await?;
        Ok(envelope.order)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CommerceError> {
        let request = self
            .inner
            .http
            .get(format!("{}{path}", self.inner.base_url))
            .header("x-publishable-api-key", &self.inner.publishable_key);
        Self::execute(request).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CommerceError> {
        let request = self
            .inner
            .http
            .post(format!("{}{path}", self.inner.base_url))
            .header("x-publishable-api-key", &self.inner.publishable_key)
            .json(body);
        Self::execute(request).await
    }

    async fn execute<T: DeserializeOwned>(
        request: reqwest::RequestBuilder,
    ) -> Result<T, CommerceError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(CommerceError::NotFound(extract_message(&text)));
        }
        if !status.is_success() {
            tracing::debug!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "commerce API returned non-success status"
            );
            return Err(CommerceError::Api {
                status: status.as_u16(),
                message: extract_message(&text),
            });
        }

        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %text.chars().take(500).collect::<String>(),
                    "failed to parse commerce API response"
                );
                Err(CommerceError::Parse(e))
            }
        }
    }
}

/// Pull the human-readable message out of an error body, falling back to
/// the raw text.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_from_json() {
        assert_eq!(
            extract_message(r#"{"message": "cart was not found"}"#),
            "cart was not found"
        );
    }

    #[test]
    fn test_extract_message_fallback_to_raw() {
        assert_eq!(extract_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_commerce_error_display() {
        let err = CommerceError::Api {
            status: 422,
            message: "quantity must be positive".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "commerce API error (422): quantity must be positive"
        );

        let err = CommerceError::NotFound("cart_01".to_owned());
        assert_eq!(err.to_string(), "not found: cart_01");
    }
}
