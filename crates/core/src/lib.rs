//! Tidewater Core - Shared types library.
//!
//! This crate provides common types used across all Tidewater components:
//! - `checkout` - Cart, draft persistence, and the checkout state machine
//! - UI layers embedding the checkout engine
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere, including wasm targets.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, country
//!   codes, and postal addresses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
