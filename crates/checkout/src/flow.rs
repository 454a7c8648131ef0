//! The multi-step checkout state machine.
//!
//! Steps form a fixed forward sequence: contact, shipping address,
//! billing address, fulfillment option, payment. Each forward transition
//! validates the current step's fields, persists the draft, pushes the
//! step's data to the remote cart, and only then advances. Backward
//! transitions never validate and never touch the network.
//!
//! The step set is a closed enum rather than a cursor integer, so a jump
//! straight to payment is unrepresentable instead of a runtime bounds
//! check.

use serde_json::Value;
use tidewater_core::{Address, CurrencyCode, Money, OrderId, ShippingOptionId};
use tracing::instrument;

use crate::cart::CartAggregate;
use crate::commerce::CommerceError;
use crate::commerce::types::ShippingOption;
use crate::draft::{CheckoutDraft, PaymentType, SubscriptionConfig};
use crate::payment::{PaymentDecline, PaymentError};
use crate::session::{CheckoutSession, CommerceApi, OrderOutcome, PaymentApi, SessionError};
use crate::storage::{DraftStore, StorageMedium};
use crate::validate::{ValidationError, validate_address_form, validate_email};

/// One step of the checkout sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutStep {
    Contact,
    Shipping,
    Billing,
    FulfillmentOption,
    Payment,
}

impl CheckoutStep {
    /// The step after this one, or `None` at the end of the sequence.
    ///
    /// Leaving [`Self::Payment`] happens through
    /// [`CheckoutFlow::confirm`], never through `advance`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Contact => Some(Self::Shipping),
            Self::Shipping => Some(Self::Billing),
            Self::Billing => Some(Self::FulfillmentOption),
            Self::FulfillmentOption => Some(Self::Payment),
            Self::Payment => None,
        }
    }

    /// The step before this one, or `None` at the start.
    #[must_use]
    pub const fn prev(self) -> Option<Self> {
        match self {
            Self::Contact => None,
            Self::Shipping => Some(Self::Contact),
            Self::Billing => Some(Self::Shipping),
            Self::FulfillmentOption => Some(Self::Billing),
            Self::Payment => Some(Self::FulfillmentOption),
        }
    }
}

/// Where the flow currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Mid-checkout, at the given step.
    Step(CheckoutStep),
    /// The order was placed; the flow is finished.
    Completed(OrderId),
}

/// Why a transition (or confirmation) did not happen.
///
/// Validation failures and payment declines are ordinary outcomes the UI
/// renders inline; the flow's entered data is intact after every variant.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// One or more fields of the current step failed validation. The
    /// step does not advance.
    #[error("step has {} invalid field(s)", fields.len())]
    Invalid {
        fields: Vec<(&'static str, ValidationError)>,
    },
    /// The cart is below the configured minimum order quantity.
    #[error("order requires at least {required} items (cart has {have})")]
    BelowMinimum { required: u32, have: u32 },
    /// A line violates its own minimum order quantity.
    #[error("{title} requires at least {min} per order")]
    LineBelowMinimum { title: String, min: u32 },
    /// No fulfillment option has been chosen.
    #[error("no shipping option selected")]
    NoShippingOption,
    /// `advance` was called at the payment step; use `confirm` instead.
    #[error("payment step completes via confirmation, not advance")]
    ConfirmRequired,
    /// The flow already produced an order.
    #[error("checkout already completed")]
    AlreadyCompleted,
    /// The payment processor declined the charge. The flow stays at the
    /// payment step and the draft is kept for retry.
    #[error("payment declined: {}", .0.message)]
    Declined(PaymentDecline),
    #[error(transparent)]
    Commerce(#[from] CommerceError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Session(SessionError),
}

impl From<SessionError> for CheckoutError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Commerce(e) => Self::Commerce(e),
            SessionError::Payment(e) => Self::Payment(e),
            other => Self::Session(other),
        }
    }
}

/// Drives one buyer's checkout from first step to placed order.
///
/// Owns the draft, the local cart, and the current stage; delegates all
/// remote effects to a [`CheckoutSession`]. Constructing a flow resumes
/// any unexpired draft from storage, so a returning buyer lands with
/// their fields filled in.
pub struct CheckoutFlow<C, P, M> {
    session: CheckoutSession<C, P, M>,
    store: DraftStore<M>,
    cart: CartAggregate,
    draft: CheckoutDraft,
    stage: Stage,
    min_order_quantity: u32,
    currency: CurrencyCode,
    /// Options fetched when the fulfillment step is reached.
    shipping_options: Vec<ShippingOption>,
    /// Client secret of the active payment session, set on entering the
    /// payment step.
    client_secret: Option<String>,
}

impl<C: CommerceApi, P: PaymentApi, M: StorageMedium> CheckoutFlow<C, P, M> {
    /// Start (or resume) a checkout.
    pub fn new(
        session: CheckoutSession<C, P, M>,
        store: DraftStore<M>,
        cart: CartAggregate,
        min_order_quantity: u32,
        currency: CurrencyCode,
    ) -> Self {
        let draft = store.load().unwrap_or_default();
        Self {
            session,
            store,
            cart,
            draft,
            stage: Stage::Step(CheckoutStep::Contact),
            min_order_quantity: min_order_quantity.max(1),
            currency,
            shipping_options: Vec::new(),
            client_secret: None,
        }
    }

    /// Pre-seed the contact email from an authenticated identity.
    ///
    /// A resumed draft's email wins over the seed; the buyer may have
    /// deliberately typed a different one.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        if self.draft.email.is_none() {
            let email = email.into();
            self.store.save_field("email", Value::String(email.clone()));
            self.draft.email = Some(email);
        }
        self
    }

    /// The current stage.
    #[must_use]
    pub const fn stage(&self) -> &Stage {
        &self.stage
    }

    /// The active step, or `None` once completed.
    #[must_use]
    pub const fn step(&self) -> Option<CheckoutStep> {
        match self.stage {
            Stage::Step(step) => Some(step),
            Stage::Completed(_) => None,
        }
    }

    /// The placed order's ID, once completed.
    #[must_use]
    pub const fn completed_order(&self) -> Option<&OrderId> {
        match &self.stage {
            Stage::Completed(order_id) => Some(order_id),
            Stage::Step(_) => None,
        }
    }

    /// The draft as entered so far.
    #[must_use]
    pub const fn draft(&self) -> &CheckoutDraft {
        &self.draft
    }

    /// The local cart.
    #[must_use]
    pub const fn cart(&self) -> &CartAggregate {
        &self.cart
    }

    /// Mutable access to the local cart for add/remove/quantity events.
    pub fn cart_mut(&mut self) -> &mut CartAggregate {
        &mut self.cart
    }

    /// Cart subtotal in the configured currency.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.cart.subtotal(self.currency)
    }

    /// Fulfillment options fetched for the cart's address. Empty until
    /// the fulfillment step is reached.
    #[must_use]
    pub fn shipping_options(&self) -> &[ShippingOption] {
        &self.shipping_options
    }

    /// Set the contact email. Persisted immediately; validated on
    /// `advance`.
    pub fn set_email(&mut self, email: impl Into<String>) {
        let email = email.into();
        self.store.save_field("email", Value::String(email.clone()));
        self.draft.email = Some(email);
    }

    /// Set the shipping address. Persisted immediately.
    pub fn set_shipping_address(&mut self, address: Address) {
        self.draft.shipping_address = address;
        self.persist();
    }

    /// Set the billing address. Persisted immediately.
    pub fn set_billing_address(&mut self, address: Address) {
        self.draft.billing_address = address;
        self.persist();
    }

    /// Toggle reuse of the shipping address for billing.
    pub fn set_use_same_for_billing(&mut self, same: bool) {
        self.draft.use_same_for_billing = same;
        self.persist();
    }

    /// Choose a fulfillment option. Pushed to the remote cart when the
    /// fulfillment step advances.
    pub fn select_shipping_option(&mut self, option_id: ShippingOptionId) {
        self.draft.shipping_option_id = Some(option_id);
        self.persist();
    }

    /// Switch between one-time and subscription purchase.
    pub fn set_payment_type(&mut self, payment_type: PaymentType) {
        self.draft.payment_type = payment_type;
        if payment_type == PaymentType::OneTime {
            self.draft.subscription_config = None;
        }
        self.persist();
    }

    /// Set the subscription cadence (implies a subscription purchase).
    pub fn set_subscription_config(&mut self, config: SubscriptionConfig) {
        self.draft.payment_type = PaymentType::Subscription;
        self.draft.subscription_config = Some(config);
        self.persist();
    }

    /// Validate the current step, persist the draft, push its data to
    /// the remote cart, then move to the next step.
    ///
    /// The draft and stage are unchanged when this returns an error, so
    /// the buyer never loses entered data to a failed transition.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::Invalid`] with per-field errors when validation
    /// fails, the minimum-order variants when the cart gate blocks, or a
    /// remote error when a push fails.
    #[instrument(skip(self), fields(step = ?self.step()))]
    pub async fn advance(&mut self) -> Result<(), CheckoutError> {
        let step = match self.stage {
            Stage::Step(step) => step,
            Stage::Completed(_) => return Err(CheckoutError::AlreadyCompleted),
        };

        match step {
            CheckoutStep::Contact => self.advance_contact().await,
            CheckoutStep::Shipping => self.advance_shipping().await,
            CheckoutStep::Billing => self.advance_billing().await,
            CheckoutStep::FulfillmentOption => self.advance_fulfillment().await,
            CheckoutStep::Payment => Err(CheckoutError::ConfirmRequired),
        }
    }

    /// Step back. Never validates, never persists, never calls out.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::AlreadyCompleted`] once an order exists; a
    /// placed order cannot be walked back.
    pub fn back(&mut self) -> Result<(), CheckoutError> {
        match self.stage {
            Stage::Step(step) => {
                if let Some(prev) = step.prev() {
                    self.stage = Stage::Step(prev);
                }
                Ok(())
            }
            Stage::Completed(_) => Err(CheckoutError::AlreadyCompleted),
        }
    }

    /// Confirm payment and place the order.
    ///
    /// On success the stage moves to [`Stage::Completed`], the persisted
    /// draft is cleared, and the cached cart ID is forgotten. On a
    /// decline the stage stays at the payment step and nothing is
    /// cleared, so the buyer can retry with another instrument.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::Declined`] for a processor decline; transport or
    /// API failures otherwise.
    #[instrument(skip(self))]
    pub async fn confirm(&mut self) -> Result<OrderId, CheckoutError> {
        match self.stage {
            Stage::Step(CheckoutStep::Payment) => {}
            Stage::Step(_) => return Err(CheckoutError::ConfirmRequired),
            Stage::Completed(_) => return Err(CheckoutError::AlreadyCompleted),
        }

        let cart = self.session.ensure_cart().await?;

        // Same-as-shipping defers the billing push to order creation; the
        // order must still carry a billing address, so apply it here.
        if self.draft.use_same_for_billing {
            self.session
                .set_billing_address(&cart.id, self.draft.effective_billing())
                .await?;
        }

        let client_secret = match &self.client_secret {
            Some(secret) => secret.clone(),
            None => {
                let session = self.session.ensure_payment_session(&cart).await?;
                let secret = session
                    .client_secret()
                    .map(str::to_owned)
                    .ok_or(SessionError::NoClientSecret)?;
                self.client_secret = Some(secret.clone());
                secret
            }
        };

        match self.session.confirm_order(&cart.id, &client_secret).await? {
            OrderOutcome::Placed(order_id) => {
                self.store.clear();
                self.store.forget_cart_id();
                self.stage = Stage::Completed(order_id.clone());
                Ok(order_id)
            }
            OrderOutcome::Declined(decline) => Err(CheckoutError::Declined(decline)),
        }
    }

    async fn advance_contact(&mut self) -> Result<(), CheckoutError> {
        self.check_cart_gate()?;

        let email = self.draft.email.clone().unwrap_or_default();
        if let Err(e) = validate_email(&email) {
            return Err(CheckoutError::Invalid {
                fields: vec![("email", e)],
            });
        }

        self.persist();

        let cart = self.session.ensure_cart().await?;
        let cart = self.session.sync_lines(cart, &self.cart).await?;
        self.session.set_email(&cart.id, &email).await?;

        self.stage = Stage::Step(CheckoutStep::Shipping);
        Ok(())
    }

    async fn advance_shipping(&mut self) -> Result<(), CheckoutError> {
        let report = validate_address_form(&self.draft.shipping_address, false);
        if !report.is_valid() {
            return Err(invalid(report.errors()));
        }

        self.persist();

        let cart = self.session.ensure_cart().await?;
        self.session
            .set_shipping_address(&cart.id, &self.draft.shipping_address)
            .await?;

        self.stage = Stage::Step(CheckoutStep::Billing);
        Ok(())
    }

    async fn advance_billing(&mut self) -> Result<(), CheckoutError> {
        // Same-as-shipping skips both validation and the remote push;
        // the shipping address stands in for billing at order creation.
        if !self.draft.use_same_for_billing {
            let report = validate_address_form(&self.draft.billing_address, false);
            if !report.is_valid() {
                return Err(invalid(report.errors()));
            }
        }

        self.persist();

        if !self.draft.use_same_for_billing {
            let cart = self.session.ensure_cart().await?;
            self.session
                .set_billing_address(&cart.id, &self.draft.billing_address)
                .await?;
        }

        let cart = self.session.ensure_cart().await?;
        self.shipping_options = self.session.list_shipping_options(&cart.id).await?;

        self.stage = Stage::Step(CheckoutStep::FulfillmentOption);
        Ok(())
    }

    async fn advance_fulfillment(&mut self) -> Result<(), CheckoutError> {
        // Re-check the cart gate before money changes hands; quantities
        // may have been edited since the contact step.
        self.check_cart_gate()?;

        let option_id = self
            .draft
            .shipping_option_id
            .clone()
            .ok_or(CheckoutError::NoShippingOption)?;

        self.persist();

        let cart = self.session.ensure_cart().await?;
        let cart = self.session.select_shipping_option(&cart.id, &option_id).await?;

        let payment = self.session.ensure_payment_session(&cart).await?;
        self.client_secret = payment.client_secret().map(str::to_owned);

        self.stage = Stage::Step(CheckoutStep::Payment);
        Ok(())
    }

    /// Cart-level preconditions, independent of per-step field checks.
    fn check_cart_gate(&self) -> Result<(), CheckoutError> {
        if let Some(line) = self.cart.below_minimum_lines().first() {
            return Err(CheckoutError::LineBelowMinimum {
                title: line.title.clone(),
                min: line.min_order,
            });
        }
        let have = self.cart.total_quantity();
        if have < self.min_order_quantity {
            return Err(CheckoutError::BelowMinimum {
                required: self.min_order_quantity,
                have,
            });
        }
        Ok(())
    }

    fn persist(&self) {
        self.store.save(&self.draft);
    }
}

fn invalid(errors: Vec<(&'static str, &ValidationError)>) -> CheckoutError {
    CheckoutError::Invalid {
        fields: errors
            .into_iter()
            .map(|(field, e)| (field, e.clone()))
            .collect(),
    }
}
