//! The in-progress checkout draft.
//!
//! The draft holds everything the buyer has entered across steps. It is
//! mirrored to durable storage (see [`crate::storage`]) after every field
//! change and cleared exactly once, when an order is confirmed.

use serde::{Deserialize, Serialize};
use tidewater_core::{Address, ShippingOptionId};

/// Whether the order is a one-off purchase or a recurring subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Single charge.
    #[default]
    OneTime,
    /// Recurring charge; see [`SubscriptionConfig`].
    Subscription,
}

/// Delivery cadence for a subscription order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionConfig {
    /// Days between deliveries.
    pub interval_days: u32,
}

/// Everything the buyer has entered so far.
///
/// Serializes with camelCase keys to match the persisted
/// `checkout_data_v1` document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutDraft {
    /// Contact email; pre-seeded from an authenticated identity when known.
    pub email: Option<String>,
    /// Delivery address.
    pub shipping_address: Address,
    /// Billing address; ignored while `use_same_for_billing` is set.
    pub billing_address: Address,
    /// Reuse the shipping address for billing.
    pub use_same_for_billing: bool,
    /// Chosen fulfillment option, once the buyer has picked one.
    pub shipping_option_id: Option<ShippingOptionId>,
    /// One-off purchase or subscription.
    pub payment_type: PaymentType,
    /// Subscription cadence, present only for subscription orders.
    pub subscription_config: Option<SubscriptionConfig>,
}

impl Default for CheckoutDraft {
    fn default() -> Self {
        Self {
            email: None,
            shipping_address: Address::default(),
            billing_address: Address::default(),
            // Most buyers bill to the delivery address.
            use_same_for_billing: true,
            shipping_option_id: None,
            payment_type: PaymentType::default(),
            subscription_config: None,
        }
    }
}

impl CheckoutDraft {
    /// The address the order should bill to, honoring the
    /// same-as-shipping flag.
    #[must_use]
    pub const fn effective_billing(&self) -> &Address {
        if self.use_same_for_billing {
            &self.shipping_address
        } else {
            &self.billing_address
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bills_to_shipping() {
        let draft = CheckoutDraft::default();
        assert!(draft.use_same_for_billing);
        assert_eq!(draft.effective_billing(), &draft.shipping_address);
    }

    #[test]
    fn test_effective_billing_when_separate() {
        let mut draft = CheckoutDraft::default();
        draft.use_same_for_billing = false;
        draft.billing_address.city = "Lyon".to_owned();
        assert_eq!(draft.effective_billing().city, "Lyon");
    }

    #[test]
    fn test_persisted_key_shape() {
        let draft = CheckoutDraft {
            email: Some("buyer@example.com".to_owned()),
            payment_type: PaymentType::Subscription,
            subscription_config: Some(SubscriptionConfig { interval_days: 30 }),
            ..CheckoutDraft::default()
        };
        let value = serde_json::to_value(&draft).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("email"));
        assert!(obj.contains_key("shippingAddress"));
        assert!(obj.contains_key("billingAddress"));
        assert!(obj.contains_key("useSameForBilling"));
        assert!(obj.contains_key("paymentType"));
        assert!(obj.contains_key("subscriptionConfig"));
        assert_eq!(value["paymentType"], "subscription");
        assert_eq!(value["subscriptionConfig"]["intervalDays"], 30);
    }
}
