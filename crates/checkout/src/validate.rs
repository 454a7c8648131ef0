//! Pure field validators for checkout forms.
//!
//! Each validator takes raw form input and returns `Ok(())` or a
//! [`ValidationError`] carrying the message shown next to the field. The
//! flow re-runs these at submit time even when the UI validates per
//! keystroke, so programmatically edited fields (autofill) are still
//! checked before a step advances.

use std::sync::LazyLock;

use regex::Regex;
use tidewater_core::{Address, CountryCode, Email};

/// Minimum length for a name or city.
const MIN_NAME_LENGTH: usize = 2;
/// Minimum length for a street address line.
const MIN_ADDRESS_LINE_LENGTH: usize = 3;

/// A field-level validation failure.
///
/// The `Display` output is the user-facing inline message.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("email address is required")]
    MissingEmail,
    #[error("enter a valid email address")]
    MalformedEmail,
    #[error("enter a valid phone number for {country}")]
    MalformedPhone { country: &'static str },
    #[error("phone number is required")]
    MissingPhone,
    #[error("postal code is required")]
    MissingPostalCode,
    #[error("enter a valid postal code for {country}")]
    MalformedPostalCode { country: &'static str },
    #[error("select a delivery country")]
    MissingCountry,
    #[error("we do not deliver to this country yet")]
    UnsupportedCountry,
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
    #[error("{field} can only contain letters, spaces, hyphens, and apostrophes")]
    BadCharacters { field: &'static str },
}

static NAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"^[\p{L} '\-]+$").unwrap()
});

/// Validate a contact email address.
///
/// # Errors
///
/// Returns [`ValidationError::MissingEmail`] for empty input and
/// [`ValidationError::MalformedEmail`] when the input does not have a
/// `local@domain.tld` shape.
pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingEmail);
    }
    Email::parse(trimmed).map_err(|_| ValidationError::MalformedEmail)?;
    Ok(())
}

/// Per-country phone pattern, matched against the input with separator
/// characters (spaces, dashes, dots, parentheses) stripped.
///
/// Countries without their own entry fall back to the GB pattern.
fn phone_pattern(country: CountryCode) -> &'static Regex {
    static GB: LazyLock<Regex> = LazyLock::new(|| compile(r"^(?:\+44|0)\d{9,10}$"));
    static NA: LazyLock<Regex> = LazyLock::new(|| compile(r"^(?:\+1)?\d{10}$"));
    static AU: LazyLock<Regex> = LazyLock::new(|| compile(r"^(?:\+61|0)\d{9}$"));
    static DE: LazyLock<Regex> = LazyLock::new(|| compile(r"^(?:\+49|0)\d{9,11}$"));
    static FR: LazyLock<Regex> = LazyLock::new(|| compile(r"^(?:\+33|0)\d{9}$"));

    match country {
        CountryCode::Us | CountryCode::Ca => &NA,
        CountryCode::Au => &AU,
        CountryCode::De => &DE,
        CountryCode::Fr => &FR,
        CountryCode::Gb => &GB,
    }
}

/// Validate a phone number against the country's pattern.
///
/// An empty phone is valid unless `required` is set: phone is optional
/// everywhere except where a step explicitly requires it.
///
/// # Errors
///
/// Returns an error for a required-but-empty phone or one that does not
/// match the country's pattern.
pub fn validate_phone(
    value: &str,
    country: CountryCode,
    required: bool,
) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return if required {
            Err(ValidationError::MissingPhone)
        } else {
            Ok(())
        };
    }

    let stripped: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if phone_pattern(country).is_match(&stripped) {
        Ok(())
    } else {
        Err(ValidationError::MalformedPhone {
            country: country.as_str(),
        })
    }
}

/// Per-country postal code pattern.
///
/// `None` means we have no pattern on file for the country and accept any
/// non-empty value (permissive fallback). All currently supported
/// countries have patterns; the fallback covers countries added to
/// [`CountryCode`] before a pattern lands here.
fn postal_pattern(country: CountryCode) -> Option<&'static Regex> {
    static GB: LazyLock<Regex> =
        LazyLock::new(|| compile(r"(?i)^[A-Z]{1,2}\d[A-Z\d]?\s?\d[A-Z]{2}$"));
    static US: LazyLock<Regex> = LazyLock::new(|| compile(r"^\d{5}(?:-\d{4})?$"));
    static CA: LazyLock<Regex> =
        LazyLock::new(|| compile(r"(?i)^[A-Z]\d[A-Z]\s?\d[A-Z]\d$"));
    static AU: LazyLock<Regex> = LazyLock::new(|| compile(r"^\d{4}$"));
    static DE: LazyLock<Regex> = LazyLock::new(|| compile(r"^\d{5}$"));
    static FR: LazyLock<Regex> = LazyLock::new(|| compile(r"^\d{5}$"));

    match country {
        CountryCode::Gb => Some(&GB),
        CountryCode::Us => Some(&US),
        CountryCode::Ca => Some(&CA),
        CountryCode::Au => Some(&AU),
        CountryCode::De => Some(&DE),
        CountryCode::Fr => Some(&FR),
    }
}

/// Validate a postal code for the given country.
///
/// # Errors
///
/// Returns an error for an empty postal code (always required) or one
/// that does not match the country's pattern.
pub fn validate_postal_code(value: &str, country: CountryCode) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingPostalCode);
    }
    match postal_pattern(country) {
        Some(pattern) if !pattern.is_match(trimmed) => Err(ValidationError::MalformedPostalCode {
            country: country.as_str(),
        }),
        _ => Ok(()),
    }
}

/// Validate a country code against the supported delivery list.
///
/// # Errors
///
/// Returns an error for an empty or unsupported country.
pub fn validate_country(value: &str) -> Result<CountryCode, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingCountry);
    }
    CountryCode::parse(value).map_err(|_| ValidationError::UnsupportedCountry)
}

/// Validate a personal or place name (letters, spaces, hyphen, apostrophe).
///
/// # Errors
///
/// Returns an error for empty, too-short, or bad-charset input.
pub fn validate_name(value: &str, field: &'static str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    if trimmed.chars().count() < MIN_NAME_LENGTH {
        return Err(ValidationError::TooShort {
            field,
            min: MIN_NAME_LENGTH,
        });
    }
    if !NAME_CHARS.is_match(trimmed) {
        return Err(ValidationError::BadCharacters { field });
    }
    Ok(())
}

/// Validate a street address line.
///
/// # Errors
///
/// Returns an error for empty or too-short input.
pub fn validate_address_line(value: &str, field: &'static str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    if trimmed.chars().count() < MIN_ADDRESS_LINE_LENGTH {
        return Err(ValidationError::TooShort {
            field,
            min: MIN_ADDRESS_LINE_LENGTH,
        });
    }
    Ok(())
}

/// Validate a city name.
///
/// # Errors
///
/// Same rules as [`validate_name`].
pub fn validate_city(value: &str) -> Result<(), ValidationError> {
    validate_name(value, "city")
}

/// Per-field validation results for an [`Address`] form.
///
/// `None` means the field passed; `Some` carries the inline message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressReport {
    pub first_name: Option<ValidationError>,
    pub last_name: Option<ValidationError>,
    pub line1: Option<ValidationError>,
    pub city: Option<ValidationError>,
    pub country: Option<ValidationError>,
    pub postal_code: Option<ValidationError>,
    pub phone: Option<ValidationError>,
}

impl AddressReport {
    /// Whether every field passed.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.line1.is_none()
            && self.city.is_none()
            && self.country.is_none()
            && self.postal_code.is_none()
            && self.phone.is_none()
    }

    /// All failures as `(field, error)` pairs, for logging or display.
    #[must_use]
    pub fn errors(&self) -> Vec<(&'static str, &ValidationError)> {
        let mut out = Vec::new();
        let fields = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("country", &self.country),
            ("postal_code", &self.postal_code),
            ("phone", &self.phone),
        ];
        for (name, slot) in fields {
            if let Some(err) = slot {
                out.push((name, err));
            }
        }
        out
    }
}

/// Run all field validators over an address form.
///
/// Phone and postal validation need a country; when the country field
/// itself fails, those checks run against the GB fallback so the user
/// still sees obviously malformed input flagged.
#[must_use]
pub fn validate_address_form(address: &Address, phone_required: bool) -> AddressReport {
    let country = validate_country(&address.country);
    let pattern_country = *country.as_ref().unwrap_or(&CountryCode::Gb);

    AddressReport {
        first_name: validate_name(&address.first_name, "first name").err(),
        last_name: validate_name(&address.last_name, "last name").err(),
        line1: validate_address_line(&address.line1, "address").err(),
        city: validate_city(&address.city).err(),
        country: country.err(),
        postal_code: validate_postal_code(&address.postal_code, pattern_country).err(),
        phone: validate_phone(
            address.phone.as_deref().unwrap_or(""),
            pattern_country,
            phone_required,
        )
        .err(),
    }
}

/// Reduce an [`AddressReport`] to a single boolean.
#[must_use]
pub fn is_address_form_valid(address: &Address, phone_required: bool) -> bool {
    validate_address_form(address, phone_required).is_valid()
}

#[allow(clippy::unwrap_used)] // patterns are compile-time constants
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}
