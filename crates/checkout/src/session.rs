//! Cart/order session orchestration.
//!
//! [`CheckoutSession`] sits between the checkout flow and the two remote
//! APIs. It owns the cached remote cart ID (self-healing when stale), the
//! wire-format concerns (lowercase country codes), payment-session
//! idempotence, and the confirm-then-complete handoff.
//!
//! The remote APIs are reached through the [`CommerceApi`] and
//! [`PaymentApi`] traits so tests can construct isolated sessions over
//! scripted doubles; production code uses the `reqwest` clients.

use tidewater_core::{Address, CartId, OrderId, ShippingOptionId, VariantId};
use tracing::instrument;

use crate::cart::CartAggregate;
use crate::commerce::types::{
    CartUpdate, CompleteOutcome, PaymentSession, RemoteAddress, RemoteCart, RemoteOrder,
    ShippingOption,
};
use crate::commerce::{CommerceClient, CommerceError};
use crate::config::CheckoutConfig;
use crate::payment::{ConfirmOutcome, PaymentClient, PaymentDecline, PaymentError};
use crate::storage::{DraftStore, StorageMedium};

/// Operations the session needs from the commerce API.
#[allow(async_fn_in_trait)] // consumers are generic, not trait objects
pub trait CommerceApi {
    async fn create_cart(&self, region_id: &str) -> Result<RemoteCart, CommerceError>;
    async fn get_cart(&self, cart_id: &CartId) -> Result<RemoteCart, CommerceError>;
    async fn update_cart(
        &self,
        cart_id: &CartId,
        update: &CartUpdate,
    ) -> Result<RemoteCart, CommerceError>;
    async fn add_line_item(
        &self,
        cart_id: &CartId,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<RemoteCart, CommerceError>;
    async fn update_line_item(
        &self,
        cart_id: &CartId,
        item_id: &str,
        quantity: u32,
    ) -> Result<RemoteCart, CommerceError>;
    async fn delete_line_item(
        &self,
        cart_id: &CartId,
        item_id: &str,
    ) -> Result<RemoteCart, CommerceError>;
    async fn list_shipping_options(
        &self,
        cart_id: &CartId,
    ) -> Result<Vec<ShippingOption>, CommerceError>;
    async fn add_shipping_method(
        &self,
        cart_id: &CartId,
        option_id: &ShippingOptionId,
    ) -> Result<RemoteCart, CommerceError>;
    async fn create_payment_sessions(&self, cart_id: &CartId)
    -> Result<RemoteCart, CommerceError>;
    async fn select_payment_session(
        &self,
        cart_id: &CartId,
        provider_id: &str,
    ) -> Result<RemoteCart, CommerceError>;
    async fn complete_cart(&self, cart_id: &CartId) -> Result<CompleteOutcome, CommerceError>;
    async fn get_order(&self, order_id: &OrderId) -> Result<RemoteOrder, CommerceError>;
    async fn get_order_by_cart(&self, cart_id: &CartId) -> Result<RemoteOrder, CommerceError>;
}

impl CommerceApi for CommerceClient {
    async fn create_cart(&self, region_id: &str) -> Result<RemoteCart, CommerceError> {
        Self::create_cart(self, region_id).await
    }
    async fn get_cart(&self, cart_id: &CartId) -> Result<RemoteCart, CommerceError> {
        Self::get_cart(self, cart_id).await
    }
    async fn update_cart(
        &self,
        cart_id: &CartId,
        update: &CartUpdate,
    ) -> Result<RemoteCart, CommerceError> {
        Self::update_cart(self, cart_id, update).await
    }
    async fn add_line_item(
        &self,
        cart_id: &CartId,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<RemoteCart, CommerceError> {
        Self::add_line_item(self, cart_id, variant_id, quantity).await
    }
    async fn update_line_item(
        &self,
        cart_id: &CartId,
        item_id: &str,
        quantity: u32,
    ) -> Result<RemoteCart, CommerceError> {
        Self::update_line_item(self, cart_id, item_id, quantity).await
    }
    async fn delete_line_item(
        &self,
        cart_id: &CartId,
        item_id: &str,
    ) -> Result<RemoteCart, CommerceError> {
        Self::delete_line_item(self, cart_id, item_id).await
    }
    async fn list_shipping_options(
        &self,
        cart_id: &CartId,
    ) -> Result<Vec<ShippingOption>, CommerceError> {
        Self::list_shipping_options(self, cart_id).await
    }
    async fn add_shipping_method(
        &self,
        cart_id: &CartId,
        option_id: &ShippingOptionId,
    ) -> Result<RemoteCart, CommerceError> {
        Self::add_shipping_method(self, cart_id, option_id).await
    }
    async fn create_payment_sessions(
        &self,
        cart_id: &CartId,
    ) -> Result<RemoteCart, CommerceError> {
        Self::create_payment_sessions(self, cart_id).await
    }
    async fn select_payment_session(
        &self,
        cart_id: &CartId,
        provider_id: &str,
    ) -> Result<RemoteCart, CommerceError> {
        Self::select_payment_session(self, cart_id, provider_id).await
    }
    async fn complete_cart(&self, cart_id: &CartId) -> Result<CompleteOutcome, CommerceError> {
        Self::complete_cart(self, cart_id).await
    }
    async fn get_order(&self, order_id: &OrderId) -> Result<RemoteOrder, CommerceError> {
        Self::get_order(self, order_id).await
    }
    async fn get_order_by_cart(&self, cart_id: &CartId) -> Result<RemoteOrder, CommerceError> {
        Self::get_order_by_cart(self, cart_id).await
    }
}

/// Operations the session needs from the payment API.
#[allow(async_fn_in_trait)] // consumers are generic, not trait objects
pub trait PaymentApi {
    async fn confirm(&self, client_secret: &str) -> Result<ConfirmOutcome, PaymentError>;
}

impl PaymentApi for PaymentClient {
    async fn confirm(&self, client_secret: &str) -> Result<ConfirmOutcome, PaymentError> {
        Self::confirm(self, client_secret).await
    }
}

/// Errors from session orchestration.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Commerce(#[from] CommerceError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    /// The provider created a session without a client secret.
    #[error("payment session has no client secret")]
    NoClientSecret,
    /// The cart completion endpoint returned something other than an order.
    #[error("cart {0} completed without producing an order")]
    NotCompleted(CartId),
}

/// Result of handing the cart off for payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    /// The order was placed.
    Placed(OrderId),
    /// Payment was declined; the cart and draft remain intact for retry.
    Declined(PaymentDecline),
}

/// Orchestrates one checkout's remote state across both APIs.
pub struct CheckoutSession<C, P, M> {
    commerce: C,
    payment: P,
    store: DraftStore<M>,
    region_id: String,
    provider_id: String,
}

impl<M: StorageMedium> CheckoutSession<CommerceClient, PaymentClient, M> {
    /// Build a session over the production API clients.
    #[must_use]
    pub fn from_config(config: &CheckoutConfig, store: DraftStore<M>) -> Self {
        Self::new(
            CommerceClient::new(&config.commerce),
            PaymentClient::new(&config.payment),
            store,
            config.region_id.clone(),
            config.payment.provider_id.clone(),
        )
    }
}

impl<C: CommerceApi, P: PaymentApi, M: StorageMedium> CheckoutSession<C, P, M> {
    /// Build a session over arbitrary API implementations.
    pub const fn new(
        commerce: C,
        payment: P,
        store: DraftStore<M>,
        region_id: String,
        provider_id: String,
    ) -> Self {
        Self {
            commerce,
            payment,
            store,
            region_id,
            provider_id,
        }
    }

    /// The payment provider the session selects on the cart.
    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Return the remote cart, creating one if needed.
    ///
    /// A cached cart ID that no longer retrieves (expired, deleted) or
    /// points at an already-completed cart is discarded and a fresh cart
    /// is created; that failure never reaches the caller. If creating the
    /// replacement also fails, the error propagates - one retry only.
    ///
    /// # Errors
    ///
    /// Returns an error if a fresh cart cannot be created.
    #[instrument(skip(self))]
    pub async fn ensure_cart(&self) -> Result<RemoteCart, CommerceError> {
        if let Some(cart_id) = self.store.cached_cart_id() {
            match self.commerce.get_cart(&cart_id).await {
                Ok(cart) if cart.completed_at.is_none() => return Ok(cart),
                Ok(_) => {
                    tracing::debug!(%cart_id, "cached cart already completed; starting fresh");
                }
                Err(e) => {
                    tracing::warn!(%cart_id, error = %e, "cached cart not retrievable; creating a new one");
                }
            }
            self.store.forget_cart_id();
        }

        let cart = self.commerce.create_cart(&self.region_id).await?;
        self.store.cache_cart_id(&cart.id);
        Ok(cart)
    }

    /// Set the contact email on the remote cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the update.
    pub async fn set_email(&self, cart_id: &CartId, email: &str) -> Result<RemoteCart, CommerceError> {
        let update = CartUpdate {
            email: Some(email.to_owned()),
            ..CartUpdate::default()
        };
        self.commerce.update_cart(cart_id, &update).await
    }

    /// Push the shipping address to the remote cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the address.
    pub async fn set_shipping_address(
        &self,
        cart_id: &CartId,
        address: &Address,
    ) -> Result<RemoteCart, CommerceError> {
        let update = CartUpdate {
            shipping_address: Some(RemoteAddress::from(address)),
            ..CartUpdate::default()
        };
        self.commerce.update_cart(cart_id, &update).await
    }

    /// Push the billing address to the remote cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the address.
    pub async fn set_billing_address(
        &self,
        cart_id: &CartId,
        address: &Address,
    ) -> Result<RemoteCart, CommerceError> {
        let update = CartUpdate {
            billing_address: Some(RemoteAddress::from(address)),
            ..CartUpdate::default()
        };
        self.commerce.update_cart(cart_id, &update).await
    }

    /// Mirror the local cart's lines onto the remote cart.
    ///
    /// Adds missing variants, reconciles quantities, and removes remote
    /// items the buyer no longer has locally.
    ///
    /// # Errors
    ///
    /// Returns an error if any line mutation fails.
    #[instrument(skip(self, remote, local), fields(cart_id = %remote.id))]
    pub async fn sync_lines(
        &self,
        remote: RemoteCart,
        local: &CartAggregate,
    ) -> Result<RemoteCart, CommerceError> {
        let cart_id = remote.id.clone();
        let mut current = remote;

        for line in local.lines() {
            match current.item_for_variant(&line.variant_id) {
                None => {
                    current = self
                        .commerce
                        .add_line_item(&cart_id, &line.variant_id, line.quantity)
                        .await?;
                }
                Some(item) if item.quantity != line.quantity => {
                    let item_id = item.id.clone();
                    current = self
                        .commerce
                        .update_line_item(&cart_id, &item_id, line.quantity)
                        .await?;
                }
                Some(_) => {}
            }
        }

        let stale: Vec<String> = current
            .items
            .iter()
            .filter(|item| {
                item.variant_id.as_ref().is_none_or(|variant_id| {
                    !local
                        .lines()
                        .iter()
                        .any(|line| line.variant_id == *variant_id)
                })
            })
            .map(|item| item.id.clone())
            .collect();
        for item_id in stale {
            current = self.commerce.delete_line_item(&cart_id, &item_id).await?;
        }

        Ok(current)
    }

    /// List shipping options for the cart's address.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list_shipping_options(
        &self,
        cart_id: &CartId,
    ) -> Result<Vec<ShippingOption>, CommerceError> {
        self.commerce.list_shipping_options(cart_id).await
    }

    /// Attach the chosen shipping option and refresh the cart so the
    /// caller observes the updated shipping total.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the option.
    pub async fn select_shipping_option(
        &self,
        cart_id: &CartId,
        option_id: &ShippingOptionId,
    ) -> Result<RemoteCart, CommerceError> {
        self.commerce.add_shipping_method(cart_id, option_id).await?;
        self.commerce.get_cart(cart_id).await
    }

    /// Return a payment session with a client secret, creating one only
    /// if needed.
    ///
    /// Idempotent per cart: an existing session for the configured
    /// provider that already carries a client secret is reused, so
    /// re-entering the payment step never creates a duplicate session.
    ///
    /// # Errors
    ///
    /// Returns an error if session creation fails or the provider never
    /// issues a client secret.
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn ensure_payment_session(
        &self,
        cart: &RemoteCart,
    ) -> Result<PaymentSession, SessionError> {
        if let Some(existing) = cart.payment_session_for(&self.provider_id)
            && existing.client_secret().is_some()
        {
            tracing::debug!("reusing existing payment session");
            return Ok(existing.clone());
        }

        let cart = self.commerce.create_payment_sessions(&cart.id).await?;
        let cart = self
            .commerce
            .select_payment_session(&cart.id, &self.provider_id)
            .await?;

        cart.payment_session_for(&self.provider_id)
            .filter(|session| session.client_secret().is_some())
            .cloned()
            .ok_or(SessionError::NoClientSecret)
    }

    /// Confirm payment and exchange the cart for an order.
    ///
    /// A decline is returned as [`OrderOutcome::Declined`] so the caller
    /// keeps all entered data and can retry.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures or a completion response
    /// that is not an order.
    #[instrument(skip(self, client_secret), fields(cart_id = %cart_id))]
    pub async fn confirm_order(
        &self,
        cart_id: &CartId,
        client_secret: &str,
    ) -> Result<OrderOutcome, SessionError> {
        match self.payment.confirm(client_secret).await? {
            ConfirmOutcome::Declined(decline) => {
                tracing::debug!(code = %decline.code, "payment declined");
                Ok(OrderOutcome::Declined(decline))
            }
            ConfirmOutcome::Confirmed { confirmation_id } => {
                tracing::debug!(%confirmation_id, "payment confirmed; completing cart");
                match self.commerce.complete_cart(cart_id).await? {
                    CompleteOutcome::Order(order) => Ok(OrderOutcome::Placed(order.id)),
                    CompleteOutcome::Cart(_) => Err(SessionError::NotCompleted(cart_id.clone())),
                }
            }
        }
    }

    /// Fetch a completed order for the receipt view.
    ///
    /// # Errors
    ///
    /// Returns an error if the order cannot be retrieved.
    pub async fn retrieve_order(&self, order_id: &OrderId) -> Result<RemoteOrder, CommerceError> {
        self.commerce.get_order(order_id).await
    }

    /// Fetch the order created from a completed cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the order cannot be retrieved.
    pub async fn retrieve_order_by_cart(
        &self,
        cart_id: &CartId,
    ) -> Result<RemoteOrder, CommerceError> {
        self.commerce.get_order_by_cart(cart_id).await
    }
}
