//! Tidewater checkout engine.
//!
//! This crate provides the storefront's checkout core as a library, so a UI
//! layer (server-rendered or wasm) can drive it from event handlers:
//!
//! - [`cart`] - In-memory cart aggregate with minimum-order invariants
//! - [`validate`] - Pure field validators for contact and address forms
//! - [`storage`] - Durable draft persistence with a 30-day TTL
//! - [`commerce`] - Typed client for the remote commerce API
//! - [`payment`] - Typed client for the payment provider
//! - [`session`] - Cart/order orchestration over both remote APIs
//! - [`flow`] - The multi-step checkout state machine
//! - [`config`] - Environment configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use tidewater_checkout::cart::{CartAggregate, VariantRef};
//! use tidewater_checkout::flow::CheckoutFlow;
//! use tidewater_checkout::storage::{DraftStore, MemoryMedium};
//!
//! let mut cart = CartAggregate::new();
//! cart.add_item(variant, 2);
//!
//! let store = DraftStore::new(MemoryMedium::default());
//! let mut flow = CheckoutFlow::new(session, store, cart, min_order_quantity, currency);
//! flow.set_email("buyer@example.com");
//! flow.advance().await?; // Contact -> Shipping
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod commerce;
pub mod config;
pub mod draft;
pub mod flow;
pub mod payment;
pub mod session;
pub mod storage;
pub mod validate;
