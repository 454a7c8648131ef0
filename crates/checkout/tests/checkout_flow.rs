//! End-to-end checkout flow tests over scripted API doubles.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde_json::json;
use tidewater_checkout::cart::{CartAggregate, VariantRef};
use tidewater_checkout::commerce::CommerceError;
use tidewater_checkout::commerce::types::{
    CartUpdate, CompleteOutcome, PaymentSession, RemoteCart, RemoteLineItem, RemoteOrder,
    RemoteShippingMethod, ShippingOption,
};
use tidewater_checkout::flow::{CheckoutError, CheckoutFlow, CheckoutStep, Stage};
use tidewater_checkout::payment::{ConfirmOutcome, PaymentDecline, PaymentError};
use tidewater_checkout::session::{CheckoutSession, CommerceApi, PaymentApi};
use tidewater_checkout::storage::{DraftStore, MemoryMedium};
use tidewater_core::{
    Address, CartId, CurrencyCode, Money, OrderId, ProductId, ShippingOptionId, VariantId,
};

const PROVIDER: &str = "stripe";
const REGION: &str = "reg_na";

#[derive(Default)]
struct CommerceState {
    carts: HashMap<String, RemoteCart>,
    /// Cart IDs whose retrieval fails, simulating expiry on the remote.
    dead_cart_ids: HashSet<String>,
    next_cart: u32,
    next_item: u32,
    payment_sessions_created: u32,
    /// Names of cart mutations, for asserting what was (not) pushed.
    calls: Vec<String>,
}

#[derive(Default)]
struct MockCommerce {
    state: Mutex<CommerceState>,
}

impl MockCommerce {
    fn with_dead_cart(cart_id: &str) -> Self {
        let mock = Self::default();
        mock.state
            .lock()
            .unwrap()
            .dead_cart_ids
            .insert(cart_id.to_owned());
        mock
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn payment_sessions_created(&self) -> u32 {
        self.state.lock().unwrap().payment_sessions_created
    }

    fn completed_cart(&self) -> Option<RemoteCart> {
        self.state
            .lock()
            .unwrap()
            .carts
            .values()
            .find(|cart| cart.completed_at.is_some())
            .cloned()
    }

    fn mutate_cart<T>(
        &self,
        cart_id: &CartId,
        call: &str,
        f: impl FnOnce(&mut RemoteCart, &mut CommerceState) -> T,
    ) -> Result<(RemoteCart, T), CommerceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_owned());
        let mut cart = state
            .carts
            .get(cart_id.as_str())
            .cloned()
            .ok_or_else(|| CommerceError::NotFound(cart_id.as_str().to_owned()))?;
        let out = f(&mut cart, &mut state);
        state.carts.insert(cart_id.as_str().to_owned(), cart.clone());
        Ok((cart, out))
    }
}

impl CommerceApi for &MockCommerce {
    async fn create_cart(&self, region_id: &str) -> Result<RemoteCart, CommerceError> {
        let mut state = self.state.lock().unwrap();
        state.next_cart += 1;
        let cart = RemoteCart {
            id: CartId::new(format!("cart_{}", state.next_cart)),
            region_id: Some(region_id.to_owned()),
            ..RemoteCart::default()
        };
        state.calls.push("create_cart".to_owned());
        state.carts.insert(cart.id.as_str().to_owned(), cart.clone());
        Ok(cart)
    }

    async fn get_cart(&self, cart_id: &CartId) -> Result<RemoteCart, CommerceError> {
        let state = self.state.lock().unwrap();
        if state.dead_cart_ids.contains(cart_id.as_str()) {
            return Err(CommerceError::NotFound(cart_id.as_str().to_owned()));
        }
        state
            .carts
            .get(cart_id.as_str())
            .cloned()
            .ok_or_else(|| CommerceError::NotFound(cart_id.as_str().to_owned()))
    }

    async fn update_cart(
        &self,
        cart_id: &CartId,
        update: &CartUpdate,
    ) -> Result<RemoteCart, CommerceError> {
        let mut fields = Vec::new();
        if update.email.is_some() {
            fields.push("email");
        }
        if update.shipping_address.is_some() {
            fields.push("shipping_address");
        }
        if update.billing_address.is_some() {
            fields.push("billing_address");
        }
        let call = format!("update_cart {}", fields.join("+"));
        let (cart, ()) = self.mutate_cart(cart_id, &call, |cart, _| {
            if let Some(email) = &update.email {
                cart.email = Some(email.clone());
            }
            if let Some(addr) = &update.shipping_address {
                cart.shipping_address = Some(addr.clone());
            }
            if let Some(addr) = &update.billing_address {
                cart.billing_address = Some(addr.clone());
            }
        })?;
        Ok(cart)
    }

    async fn add_line_item(
        &self,
        cart_id: &CartId,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<RemoteCart, CommerceError> {
        let (cart, ()) = self.mutate_cart(cart_id, "add_line_item", |cart, state| {
            state.next_item += 1;
            cart.items.push(RemoteLineItem {
                id: format!("item_{}", state.next_item),
                variant_id: Some(variant_id.clone()),
                title: String::new(),
                quantity,
                unit_price: 1000,
            });
        })?;
        Ok(cart)
    }

    async fn update_line_item(
        &self,
        cart_id: &CartId,
        item_id: &str,
        quantity: u32,
    ) -> Result<RemoteCart, CommerceError> {
        let (cart, ()) = self.mutate_cart(cart_id, "update_line_item", |cart, _| {
            if let Some(item) = cart.items.iter_mut().find(|item| item.id == item_id) {
                item.quantity = quantity;
            }
        })?;
        Ok(cart)
    }

    async fn delete_line_item(
        &self,
        cart_id: &CartId,
        item_id: &str,
    ) -> Result<RemoteCart, CommerceError> {
        let (cart, ()) = self.mutate_cart(cart_id, "delete_line_item", |cart, _| {
            cart.items.retain(|item| item.id != item_id);
        })?;
        Ok(cart)
    }

    async fn list_shipping_options(
        &self,
        _cart_id: &CartId,
    ) -> Result<Vec<ShippingOption>, CommerceError> {
        Ok(vec![
            ShippingOption {
                id: ShippingOptionId::new("so_standard"),
                name: "Standard".to_owned(),
                amount: 500,
            },
            ShippingOption {
                id: ShippingOptionId::new("so_express"),
                name: "Express".to_owned(),
                amount: 1500,
            },
        ])
    }

    async fn add_shipping_method(
        &self,
        cart_id: &CartId,
        option_id: &ShippingOptionId,
    ) -> Result<RemoteCart, CommerceError> {
        let (cart, ()) = self.mutate_cart(cart_id, "add_shipping_method", |cart, _| {
            cart.shipping_methods = vec![RemoteShippingMethod {
                shipping_option_id: Some(option_id.clone()),
                price: 500,
            }];
            cart.shipping_total = Some(500);
        })?;
        Ok(cart)
    }

    async fn create_payment_sessions(
        &self,
        cart_id: &CartId,
    ) -> Result<RemoteCart, CommerceError> {
        let (cart, ()) = self.mutate_cart(cart_id, "create_payment_sessions", |cart, state| {
            state.payment_sessions_created += 1;
            if cart.payment_session_for(PROVIDER).is_none() {
                cart.payment_sessions.push(PaymentSession {
                    provider_id: PROVIDER.to_owned(),
                    data: json!({}),
                });
            }
        })?;
        Ok(cart)
    }

    async fn select_payment_session(
        &self,
        cart_id: &CartId,
        provider_id: &str,
    ) -> Result<RemoteCart, CommerceError> {
        let secret = {
            let state = self.state.lock().unwrap();
            format!("pi_{}_secret_{}", state.payment_sessions_created, cart_id)
        };
        let (cart, ()) = self.mutate_cart(cart_id, "select_payment_session", |cart, _| {
            if let Some(session) = cart
                .payment_sessions
                .iter_mut()
                .find(|session| session.provider_id == provider_id)
            {
                session.data = json!({ "client_secret": secret });
            }
        })?;
        Ok(cart)
    }

    async fn complete_cart(&self, cart_id: &CartId) -> Result<CompleteOutcome, CommerceError> {
        let (cart, ()) = self.mutate_cart(cart_id, "complete_cart", |cart, _| {
            cart.completed_at = Some(chrono::Utc::now());
        })?;
        Ok(CompleteOutcome::Order(RemoteOrder {
            id: OrderId::new(format!("order_for_{cart_id}")),
            cart_id: Some(cart.id),
            ..RemoteOrder::default()
        }))
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<RemoteOrder, CommerceError> {
        Ok(RemoteOrder {
            id: order_id.clone(),
            ..RemoteOrder::default()
        })
    }

    async fn get_order_by_cart(&self, cart_id: &CartId) -> Result<RemoteOrder, CommerceError> {
        Ok(RemoteOrder {
            id: OrderId::new(format!("order_for_{cart_id}")),
            cart_id: Some(cart_id.clone()),
            ..RemoteOrder::default()
        })
    }
}

#[derive(Default)]
struct MockPayment {
    /// Number of confirmation attempts to decline before succeeding.
    declines_remaining: Mutex<u32>,
    confirmations: Mutex<u32>,
}

impl MockPayment {
    fn declining(times: u32) -> Self {
        Self {
            declines_remaining: Mutex::new(times),
            confirmations: Mutex::new(0),
        }
    }
}

impl PaymentApi for &MockPayment {
    async fn confirm(&self, client_secret: &str) -> Result<ConfirmOutcome, PaymentError> {
        assert!(client_secret.contains("_secret_"));
        let mut remaining = self.declines_remaining.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(ConfirmOutcome::Declined(PaymentDecline {
                code: "card_declined".to_owned(),
                message: "Your card was declined.".to_owned(),
            }));
        }
        *self.confirmations.lock().unwrap() += 1;
        Ok(ConfirmOutcome::Confirmed {
            confirmation_id: "pi_1".to_owned(),
        })
    }
}

fn variant(product: &str, variant_id: &str, cents: i64, min_order: u32) -> VariantRef {
    VariantRef {
        product_id: ProductId::new(product),
        variant_id: VariantId::new(variant_id),
        title: format!("{product} / {variant_id}"),
        unit_price: Money::from_minor_units(cents, CurrencyCode::USD),
        compare_at_price: None,
        min_order,
        image_url: None,
    }
}

fn uk_address() -> Address {
    Address {
        first_name: "Ada".to_owned(),
        last_name: "Lovelace".to_owned(),
        line1: "12 Crescent Road".to_owned(),
        city: "London".to_owned(),
        country: "GB".to_owned(),
        postal_code: "SW1A 1AA".to_owned(),
        ..Address::default()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn flow_over<'a>(
    commerce: &'a MockCommerce,
    payment: &'a MockPayment,
    store: &DraftStore<MemoryMedium>,
    cart: CartAggregate,
    min_order_quantity: u32,
) -> CheckoutFlow<&'a MockCommerce, &'a MockPayment, MemoryMedium> {
    init_tracing();
    let session = CheckoutSession::new(
        commerce,
        payment,
        store.clone(),
        REGION.to_owned(),
        PROVIDER.to_owned(),
    );
    CheckoutFlow::new(
        session,
        store.clone(),
        cart,
        min_order_quantity,
        CurrencyCode::USD,
    )
}

async fn advance_to_payment(flow: &mut CheckoutFlow<&MockCommerce, &MockPayment, MemoryMedium>) {
    flow.set_email("buyer@example.com");
    flow.advance().await.unwrap();
    flow.set_shipping_address(uk_address());
    flow.advance().await.unwrap();
    flow.advance().await.unwrap();
    let option = flow.shipping_options()[0].id.clone();
    flow.select_shipping_option(option);
    flow.advance().await.unwrap();
    assert_eq!(flow.step(), Some(CheckoutStep::Payment));
}

#[tokio::test]
async fn test_full_checkout_places_order_and_clears_draft() {
    let commerce = MockCommerce::default();
    let payment = MockPayment::default();
    let store = DraftStore::new(MemoryMedium::default());

    let mut cart = CartAggregate::new();
    cart.add_item(variant("prod_tea", "var_loose", 1200, 1), 2);

    let mut flow = flow_over(&commerce, &payment, &store, cart, 1);
    advance_to_payment(&mut flow).await;

    let order_id = flow.confirm().await.unwrap();
    assert!(order_id.as_str().starts_with("order_for_"));
    assert!(matches!(flow.stage(), Stage::Completed(id) if *id == order_id));

    // Draft and cached cart ID are gone once the order exists.
    assert!(store.load().is_none());
    assert!(store.cached_cart_id().is_none());

    // The remote cart received the local line.
    assert!(commerce.calls().iter().any(|c| c == "add_line_item"));
}

#[tokio::test]
async fn test_minimum_order_gate_blocks_contact_step() {
    let commerce = MockCommerce::default();
    let payment = MockPayment::default();
    let store = DraftStore::new(MemoryMedium::default());

    let mut cart = CartAggregate::new();
    let line_id = cart.add_item(variant("prod_tea", "var_loose", 1200, 1), 1);

    let mut flow = flow_over(&commerce, &payment, &store, cart, 3);
    flow.set_email("buyer@example.com");

    let err = flow.advance().await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::BelowMinimum {
            required: 3,
            have: 1
        }
    ));
    assert_eq!(flow.step(), Some(CheckoutStep::Contact));
    // Nothing was pushed remotely while the gate held.
    assert!(commerce.calls().is_empty());

    flow.cart_mut().set_quantity(line_id, 3).unwrap();
    flow.advance().await.unwrap();
    assert_eq!(flow.step(), Some(CheckoutStep::Shipping));
}

#[tokio::test]
async fn test_invalid_email_blocks_without_remote_calls() {
    let commerce = MockCommerce::default();
    let payment = MockPayment::default();
    let store = DraftStore::new(MemoryMedium::default());

    let mut cart = CartAggregate::new();
    cart.add_item(variant("prod_tea", "var_loose", 1200, 1), 1);

    let mut flow = flow_over(&commerce, &payment, &store, cart, 1);
    flow.set_email("not-an-email");

    let err = flow.advance().await.unwrap_err();
    match err {
        CheckoutError::Invalid { fields } => {
            assert!(fields.iter().any(|(field, _)| *field == "email"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(flow.step(), Some(CheckoutStep::Contact));
    assert!(commerce.calls().is_empty());
}

#[tokio::test]
async fn test_same_for_billing_skips_validation_and_push() {
    let commerce = MockCommerce::default();
    let payment = MockPayment::default();
    let store = DraftStore::new(MemoryMedium::default());

    let mut cart = CartAggregate::new();
    cart.add_item(variant("prod_tea", "var_loose", 1200, 1), 1);

    let mut flow = flow_over(&commerce, &payment, &store, cart, 1);
    flow.set_email("buyer@example.com");
    flow.advance().await.unwrap();
    flow.set_shipping_address(uk_address());
    flow.advance().await.unwrap();

    // Billing fields were never entered; same-for-billing lets the step
    // pass anyway.
    assert!(flow.draft().use_same_for_billing);
    flow.advance().await.unwrap();
    assert_eq!(flow.step(), Some(CheckoutStep::FulfillmentOption));

    let calls = commerce.calls();
    assert!(!calls.iter().any(|c| c.contains("billing_address")));
    assert_eq!(flow.draft().effective_billing(), &flow.draft().shipping_address);

    // At order creation the shipping address is reused as billing, so the
    // completed cart carries one even though the step never pushed it.
    let option = flow.shipping_options()[0].id.clone();
    flow.select_shipping_option(option);
    flow.advance().await.unwrap();
    flow.confirm().await.unwrap();

    let completed = commerce.completed_cart().unwrap();
    let billing = completed.billing_address.unwrap();
    let shipping = completed.shipping_address.unwrap();
    assert_eq!(billing, shipping);
    assert_eq!(billing.city, "London");
}

#[tokio::test]
async fn test_separate_billing_is_validated_and_pushed() {
    let commerce = MockCommerce::default();
    let payment = MockPayment::default();
    let store = DraftStore::new(MemoryMedium::default());

    let mut cart = CartAggregate::new();
    cart.add_item(variant("prod_tea", "var_loose", 1200, 1), 1);

    let mut flow = flow_over(&commerce, &payment, &store, cart, 1);
    flow.set_email("buyer@example.com");
    flow.advance().await.unwrap();
    flow.set_shipping_address(uk_address());
    flow.advance().await.unwrap();

    flow.set_use_same_for_billing(false);
    let err = flow.advance().await.unwrap_err();
    assert!(matches!(err, CheckoutError::Invalid { .. }));
    assert_eq!(flow.step(), Some(CheckoutStep::Billing));

    let mut billing = uk_address();
    billing.line1 = "7 Harbour Lane".to_owned();
    flow.set_billing_address(billing);
    flow.advance().await.unwrap();

    assert!(
        commerce
            .calls()
            .iter()
            .any(|c| c.contains("billing_address"))
    );
}

#[tokio::test]
async fn test_payment_session_created_once_per_cart() {
    let commerce = MockCommerce::default();
    let payment = MockPayment::default();
    let store = DraftStore::new(MemoryMedium::default());

    let mut cart = CartAggregate::new();
    cart.add_item(variant("prod_tea", "var_loose", 1200, 1), 1);

    let mut flow = flow_over(&commerce, &payment, &store, cart, 1);
    advance_to_payment(&mut flow).await;
    assert_eq!(commerce.payment_sessions_created(), 1);

    // Walking back and re-entering the payment step reuses the session.
    flow.back().unwrap();
    flow.advance().await.unwrap();
    assert_eq!(flow.step(), Some(CheckoutStep::Payment));
    assert_eq!(commerce.payment_sessions_created(), 1);
}

#[tokio::test]
async fn test_decline_keeps_draft_and_stage_for_retry() {
    let commerce = MockCommerce::default();
    let payment = MockPayment::declining(1);
    let store = DraftStore::new(MemoryMedium::default());

    let mut cart = CartAggregate::new();
    cart.add_item(variant("prod_tea", "var_loose", 1200, 1), 1);

    let mut flow = flow_over(&commerce, &payment, &store, cart, 1);
    advance_to_payment(&mut flow).await;

    let err = flow.confirm().await.unwrap_err();
    match err {
        CheckoutError::Declined(decline) => assert_eq!(decline.code, "card_declined"),
        other => panic!("expected decline, got {other:?}"),
    }
    // Everything entered survives the decline.
    assert_eq!(flow.step(), Some(CheckoutStep::Payment));
    assert!(store.load().is_some());
    assert!(store.cached_cart_id().is_some());

    // The retry goes through without re-entering earlier steps.
    flow.confirm().await.unwrap();
    assert!(flow.completed_order().is_some());
}

#[tokio::test]
async fn test_stale_cached_cart_is_replaced() {
    let commerce = MockCommerce::with_dead_cart("cart_gone");
    let payment = MockPayment::default();
    let store = DraftStore::new(MemoryMedium::default());
    store.cache_cart_id(&CartId::new("cart_gone"));

    let mut cart = CartAggregate::new();
    cart.add_item(variant("prod_tea", "var_loose", 1200, 1), 1);

    let mut flow = flow_over(&commerce, &payment, &store, cart, 1);
    flow.set_email("buyer@example.com");
    flow.advance().await.unwrap();

    let cached = store.cached_cart_id().unwrap();
    assert_ne!(cached.as_str(), "cart_gone");
    assert!(commerce.calls().iter().any(|c| c == "create_cart"));
}

#[tokio::test]
async fn test_resumed_draft_prefills_and_outranks_seed() {
    let store = DraftStore::new(MemoryMedium::default());
    {
        let commerce = MockCommerce::default();
        let payment = MockPayment::default();
        let mut cart = CartAggregate::new();
        cart.add_item(variant("prod_tea", "var_loose", 1200, 1), 1);
        let mut flow = flow_over(&commerce, &payment, &store, cart, 1);
        flow.set_email("typed@example.com");
        flow.set_shipping_address(uk_address());
    }

    let commerce = MockCommerce::default();
    let payment = MockPayment::default();
    let mut cart = CartAggregate::new();
    cart.add_item(variant("prod_tea", "var_loose", 1200, 1), 1);
    let flow =
        flow_over(&commerce, &payment, &store, cart, 1).with_email("account@example.com");

    // The resumed draft wins over the authenticated-identity seed.
    assert_eq!(flow.draft().email.as_deref(), Some("typed@example.com"));
    assert_eq!(flow.draft().shipping_address.city, "London");
}

#[tokio::test]
async fn test_back_never_validates() {
    let commerce = MockCommerce::default();
    let payment = MockPayment::default();
    let store = DraftStore::new(MemoryMedium::default());

    let mut cart = CartAggregate::new();
    cart.add_item(variant("prod_tea", "var_loose", 1200, 1), 1);

    let mut flow = flow_over(&commerce, &payment, &store, cart, 1);
    flow.set_email("buyer@example.com");
    flow.advance().await.unwrap();

    // Clobber the email; back still works and stays at the first step.
    flow.set_email("");
    flow.back().unwrap();
    assert_eq!(flow.step(), Some(CheckoutStep::Contact));
    flow.back().unwrap();
    assert_eq!(flow.step(), Some(CheckoutStep::Contact));
}
