//! Supported delivery countries.
//!
//! This is the single canonical allow-list: the country validator, the phone
//! pattern table, and the postal-code pattern table all key off this enum, so
//! they can never disagree about which countries are supported.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error parsing a [`CountryCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CountryCodeError {
    /// The input string is empty.
    #[error("country code cannot be empty")]
    Empty,
    /// The country is not in the supported delivery list.
    #[error("country {0:?} is not supported for delivery")]
    Unsupported(String),
}

/// ISO 3166-1 alpha-2 code of a country we deliver to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CountryCode {
    /// United Kingdom.
    Gb,
    /// United States.
    Us,
    /// Canada.
    Ca,
    /// Australia.
    Au,
    /// Germany.
    De,
    /// France.
    Fr,
}

impl CountryCode {
    /// All supported delivery countries, in display order.
    pub const ALL: &'static [Self] = &[Self::Gb, Self::Us, Self::Ca, Self::Au, Self::De, Self::Fr];

    /// Parse a country code, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or names a country outside the
    /// supported delivery list.
    pub fn parse(s: &str) -> Result<Self, CountryCodeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CountryCodeError::Empty);
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "GB" | "UK" => Ok(Self::Gb),
            "US" => Ok(Self::Us),
            "CA" => Ok(Self::Ca),
            "AU" => Ok(Self::Au),
            "DE" => Ok(Self::De),
            "FR" => Ok(Self::Fr),
            _ => Err(CountryCodeError::Unsupported(trimmed.to_owned())),
        }
    }

    /// Uppercase alpha-2 code for display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gb => "GB",
            Self::Us => "US",
            Self::Ca => "CA",
            Self::Au => "AU",
            Self::De => "DE",
            Self::Fr => "FR",
        }
    }

    /// Lowercase alpha-2 code.
    ///
    /// The commerce API requires lowercase country codes on the wire; this is
    /// a wire-format concern, not a display one.
    #[must_use]
    pub const fn wire_code(self) -> &'static str {
        match self {
            Self::Gb => "gb",
            Self::Us => "us",
            Self::Ca => "ca",
            Self::Au => "au",
            Self::De => "de",
            Self::Fr => "fr",
        }
    }

    /// Human-readable country name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gb => "United Kingdom",
            Self::Us => "United States",
            Self::Ca => "Canada",
            Self::Au => "Australia",
            Self::De => "Germany",
            Self::Fr => "France",
        }
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CountryCode {
    type Err = CountryCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = CountryCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.as_str().to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(CountryCode::parse("gb").unwrap(), CountryCode::Gb);
        assert_eq!(CountryCode::parse("GB").unwrap(), CountryCode::Gb);
        assert_eq!(CountryCode::parse(" us ").unwrap(), CountryCode::Us);
    }

    #[test]
    fn test_parse_uk_alias() {
        assert_eq!(CountryCode::parse("UK").unwrap(), CountryCode::Gb);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(CountryCode::parse(""), Err(CountryCodeError::Empty));
        assert_eq!(CountryCode::parse("   "), Err(CountryCodeError::Empty));
    }

    #[test]
    fn test_parse_unsupported() {
        assert!(matches!(
            CountryCode::parse("JP"),
            Err(CountryCodeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_wire_code_is_lowercase() {
        for code in CountryCode::ALL {
            assert_eq!(code.wire_code(), code.as_str().to_lowercase());
        }
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&CountryCode::De).unwrap();
        assert_eq!(json, "\"DE\"");
        let parsed: CountryCode = serde_json::from_str("\"de\"").unwrap();
        assert_eq!(parsed, CountryCode::De);
    }
}
