//! Postal address record.

use serde::{Deserialize, Serialize};

/// A postal address as entered by the buyer.
///
/// Fields hold raw form input; validity is derived on demand by the
/// checkout validators against the current country, never stored here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    /// Recipient first name.
    pub first_name: String,
    /// Recipient last name.
    pub last_name: String,
    /// Street address, first line.
    pub line1: String,
    /// Street address, second line (apartment, suite).
    pub line2: Option<String>,
    /// City or town.
    pub city: String,
    /// Province, state, or county.
    pub province: Option<String>,
    /// ISO 3166-1 alpha-2 country code as entered (validated separately).
    pub country: String,
    /// Postal or ZIP code.
    pub postal_code: String,
    /// Contact phone number (optional on most steps).
    pub phone: Option<String>,
    /// Delivery note for the courier.
    pub note: Option<String>,
}

impl Address {
    /// Whether enough of the address is present to ask the commerce API for
    /// shipping options (country and postal code).
    #[must_use]
    pub fn can_quote_shipping(&self) -> bool {
        !self.country.trim().is_empty() && !self.postal_code.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let address = Address::default();
        assert!(address.first_name.is_empty());
        assert!(address.line2.is_none());
        assert!(!address.can_quote_shipping());
    }

    #[test]
    fn test_can_quote_shipping() {
        let address = Address {
            country: "GB".to_owned(),
            postal_code: "SW1A 1AA".to_owned(),
            ..Address::default()
        };
        assert!(address.can_quote_shipping());

        let partial = Address {
            country: "GB".to_owned(),
            ..Address::default()
        };
        assert!(!partial.can_quote_shipping());
    }
}
