//! Core types for Tidewater.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod country;
pub mod email;
pub mod id;
pub mod money;

pub use address::Address;
pub use country::{CountryCode, CountryCodeError};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Money};
