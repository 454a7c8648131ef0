//! Wire types for the commerce API.
//!
//! These are the explicit response contracts at the client boundary: raw
//! JSON from the remote API is deserialized into these types and never
//! leaks past this module untyped. Monetary amounts arrive in minor units
//! (cents), matching the API's convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidewater_core::{Address, CartId, CountryCode, OrderId, ShippingOptionId, VariantId};

/// Address in the commerce API's wire shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteAddress {
    pub first_name: String,
    pub last_name: String,
    pub address_1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_2: Option<String>,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    /// Lowercase alpha-2 code; the API rejects uppercase.
    pub country_code: String,
    pub postal_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// The wire address has no slot for the buyer's delivery note, so `note`
/// is deliberately not mapped; it lives only in the persisted draft.
impl From<&Address> for RemoteAddress {
    fn from(address: &Address) -> Self {
        Self {
            first_name: address.first_name.clone(),
            last_name: address.last_name.clone(),
            address_1: address.line1.clone(),
            address_2: address.line2.clone(),
            city: address.city.clone(),
            province: address.province.clone(),
            country_code: CountryCode::parse(&address.country).map_or_else(
                |_| address.country.trim().to_ascii_lowercase(),
                |code| code.wire_code().to_owned(),
            ),
            postal_code: address.postal_code.clone(),
            phone: address.phone.clone(),
        }
    }
}

/// A line item on the remote cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteLineItem {
    pub id: String,
    pub variant_id: Option<VariantId>,
    pub title: String,
    pub quantity: u32,
    /// Unit price in minor units.
    pub unit_price: i64,
}

/// A shipping method already attached to the remote cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteShippingMethod {
    pub shipping_option_id: Option<ShippingOptionId>,
    /// Price in minor units.
    pub price: i64,
}

/// A payment session created on the cart by a payment provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSession {
    pub provider_id: String,
    /// Provider-specific payload; for Stripe-style providers this carries
    /// the client secret.
    pub data: Value,
}

impl PaymentSession {
    /// The client secret, when the provider has issued one.
    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        self.data.get("client_secret").and_then(Value::as_str)
    }
}

/// The remote cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteCart {
    pub id: CartId,
    pub email: Option<String>,
    pub region_id: Option<String>,
    pub items: Vec<RemoteLineItem>,
    pub shipping_address: Option<RemoteAddress>,
    pub billing_address: Option<RemoteAddress>,
    pub shipping_methods: Vec<RemoteShippingMethod>,
    pub payment_sessions: Vec<PaymentSession>,
    /// Subtotal in minor units.
    pub subtotal: Option<i64>,
    /// Shipping total in minor units.
    pub shipping_total: Option<i64>,
    /// Grand total in minor units.
    pub total: Option<i64>,
    /// Set once the cart has been exchanged for an order.
    pub completed_at: Option<DateTime<Utc>>,
}

impl RemoteCart {
    /// The payment session for the given provider, if one exists.
    #[must_use]
    pub fn payment_session_for(&self, provider_id: &str) -> Option<&PaymentSession> {
        self.payment_sessions
            .iter()
            .find(|session| session.provider_id == provider_id)
    }

    /// The line item holding the given variant, if any.
    #[must_use]
    pub fn item_for_variant(&self, variant_id: &VariantId) -> Option<&RemoteLineItem> {
        self.items
            .iter()
            .find(|item| item.variant_id.as_ref() == Some(variant_id))
    }
}

/// A shipping option available for the cart's address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingOption {
    pub id: ShippingOptionId,
    pub name: String,
    /// Price in minor units.
    pub amount: i64,
}

/// A completed order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteOrder {
    pub id: OrderId,
    pub display_id: Option<i64>,
    pub cart_id: Option<CartId>,
    pub email: Option<String>,
    /// Grand total in minor units.
    pub total: Option<i64>,
}

/// Fields settable via the cart update endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CartUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<RemoteAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<RemoteAddress>,
}

/// Result of completing a cart.
///
/// The API returns the order on success, or the cart back when payment is
/// still required.
#[derive(Debug, Clone, PartialEq)]
pub enum CompleteOutcome {
    Order(RemoteOrder),
    Cart(RemoteCart),
}

// Response envelopes.

#[derive(Debug, Deserialize)]
pub(crate) struct CartEnvelope {
    pub cart: RemoteCart,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderEnvelope {
    pub order: RemoteOrder,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShippingOptionsEnvelope {
    pub shipping_options: Vec<ShippingOption>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompleteEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use tidewater_core::Address;

    use super::*;

    #[test]
    fn test_remote_address_lowercases_country() {
        let address = Address {
            country: " GB ".to_owned(),
            ..Address::default()
        };
        let remote = RemoteAddress::from(&address);
        assert_eq!(remote.country_code, "gb");
    }

    #[test]
    fn test_payment_session_client_secret() {
        let session: PaymentSession = serde_json::from_value(json!({
            "provider_id": "stripe",
            "data": { "client_secret": "pi_123_secret_456" },
        }))
        .unwrap();
        assert_eq!(session.client_secret(), Some("pi_123_secret_456"));

        let bare: PaymentSession = serde_json::from_value(json!({
            "provider_id": "stripe",
            "data": {},
        }))
        .unwrap();
        assert!(bare.client_secret().is_none());
    }

    #[test]
    fn test_cart_tolerates_sparse_payloads() {
        let cart: RemoteCart = serde_json::from_value(json!({
            "id": "cart_01",
            "items": [{ "id": "item_01", "title": "Tea", "quantity": 2, "unit_price": 450 }],
        }))
        .unwrap();
        assert_eq!(cart.id.as_str(), "cart_01");
        assert_eq!(cart.items.len(), 1);
        assert!(cart.completed_at.is_none());
        assert!(cart.payment_session_for("stripe").is_none());
    }
}
