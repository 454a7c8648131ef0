//! In-memory cart aggregate.
//!
//! Owns the cart lines and their minimum-order invariants. Totals are
//! derived synchronously on every read; there is no async settlement at
//! this layer. The aggregate is an explicitly owned value injected into
//! the checkout flow, not a module-level singleton, so tests (and multiple
//! storefront views) construct isolated instances.

use serde::{Deserialize, Serialize};
use tidewater_core::{CurrencyCode, LineId, Money, ProductId, VariantId};

/// Error from a cart mutation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// The quantity change would drop a line below its minimum order.
    ///
    /// Surfaced loudly rather than silently clamped; the UI shows an
    /// "at minimum order" notice.
    #[error("{title} requires at least {min} per order")]
    BelowMinimum { title: String, min: u32 },
    /// No line with the given ID exists.
    #[error("cart line not found")]
    LineNotFound,
}

/// Reference to a purchasable variant, as shown on a product page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRef {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub title: String,
    pub unit_price: Money,
    /// Strike-through price when the variant is on sale.
    pub compare_at_price: Option<Money>,
    /// Per-line minimum order quantity (at least 1).
    pub min_order: u32,
    pub image_url: Option<String>,
}

/// One product/variant entry in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: LineId,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub title: String,
    pub unit_price: Money,
    pub compare_at_price: Option<Money>,
    pub quantity: u32,
    pub min_order: u32,
    pub image_url: Option<String>,
}

impl CartLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Ordered collection of cart lines (insertion order = display order).
///
/// No two lines share the same `(product_id, variant_id)`; adding an
/// existing combination increments its quantity instead of duplicating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartAggregate {
    lines: Vec<CartLine>,
}

impl CartAggregate {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// The lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total quantity across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Sum of `unit_price × quantity` across lines.
    ///
    /// Returns zero in `currency_hint` for an empty cart. Lines are
    /// assumed to share one currency (the storefront sells in a single
    /// region at a time); a mismatched line is skipped with a warning.
    #[must_use]
    pub fn subtotal(&self, currency_hint: CurrencyCode) -> Money {
        let currency = self
            .lines
            .first()
            .map_or(currency_hint, |line| line.unit_price.currency);
        let mut total = Money::zero(currency);
        for line in &self.lines {
            match total.checked_add(line.line_total()) {
                Some(sum) => total = sum,
                None => {
                    tracing::warn!(line = %line.id, "skipping line with mismatched currency");
                }
            }
        }
        total
    }

    /// Add `quantity` of a variant.
    ///
    /// Merges into an existing line for the same `(product_id,
    /// variant_id)`; otherwise inserts a new line at
    /// `max(quantity, min_order)`. Returns the affected line's ID.
    pub fn add_item(&mut self, variant: VariantRef, quantity: u32) -> LineId {
        if let Some(line) = self.lines.iter_mut().find(|line| {
            line.product_id == variant.product_id && line.variant_id == variant.variant_id
        }) {
            line.quantity += quantity.max(1);
            return line.id;
        }

        let min_order = variant.min_order.max(1);
        let line = CartLine {
            id: LineId::generate(),
            product_id: variant.product_id,
            variant_id: variant.variant_id,
            title: variant.title,
            unit_price: variant.unit_price,
            compare_at_price: variant.compare_at_price,
            quantity: quantity.max(min_order),
            min_order,
            image_url: variant.image_url,
        };
        let id = line.id;
        self.lines.push(line);
        id
    }

    /// Increase a line's quantity by one.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] for an unknown line.
    pub fn increment(&mut self, line_id: LineId) -> Result<(), CartError> {
        let line = self.line_mut(line_id)?;
        line.quantity += 1;
        Ok(())
    }

    /// Decrease a line's quantity by one.
    ///
    /// Decrementing a quantity-1 line removes it. Decrementing into the
    /// range `1..min_order` is rejected with the line unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::BelowMinimum`] when the result would violate
    /// the line's minimum order, or [`CartError::LineNotFound`].
    pub fn decrement(&mut self, line_id: LineId) -> Result<(), CartError> {
        let (next, min, title) = {
            let line = self.line_mut(line_id)?;
            (
                line.quantity.saturating_sub(1),
                line.min_order,
                line.title.clone(),
            )
        };
        if next == 0 {
            return self.remove_item(line_id);
        }
        if next < min {
            return Err(CartError::BelowMinimum { title, min });
        }
        self.line_mut(line_id)?.quantity = next;
        Ok(())
    }

    /// Set a line's quantity outright.
    ///
    /// Unlike [`Self::decrement`], zero is not a removal here; removal is
    /// an explicit [`Self::remove_item`] call.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::BelowMinimum`] when `quantity` is below the
    /// line's minimum order, or [`CartError::LineNotFound`].
    pub fn set_quantity(&mut self, line_id: LineId, quantity: u32) -> Result<(), CartError> {
        let line = self.line_mut(line_id)?;
        if quantity < line.min_order {
            return Err(CartError::BelowMinimum {
                title: line.title.clone(),
                min: line.min_order,
            });
        }
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a line unconditionally.
    ///
    /// Any "are you sure" confirmation is a UI concern, not enforced here.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] for an unknown line.
    pub fn remove_item(&mut self, line_id: LineId) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|line| line.id != line_id);
        if self.lines.len() == before {
            return Err(CartError::LineNotFound);
        }
        Ok(())
    }

    /// Lines currently violating their per-line minimum order.
    ///
    /// Checkout cannot proceed while this is non-empty; violations are
    /// surfaced to the buyer, never silently fixed.
    #[must_use]
    pub fn below_minimum_lines(&self) -> Vec<&CartLine> {
        self.lines
            .iter()
            .filter(|line| line.quantity < line.min_order)
            .collect()
    }

    fn line_mut(&mut self, line_id: LineId) -> Result<&mut CartLine, CartError> {
        self.lines
            .iter_mut()
            .find(|line| line.id == line_id)
            .ok_or(CartError::LineNotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

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

    #[test]
    fn test_add_item_merges_same_variant() {
        let mut cart = CartAggregate::new();
        cart.add_item(variant("prod_1", "var_1", 1000, 1), 2);
        cart.add_item(variant("prod_1", "var_1", 1000, 1), 3);

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_add_item_distinct_variants_keep_order() {
        let mut cart = CartAggregate::new();
        cart.add_item(variant("prod_1", "var_1", 1000, 1), 1);
        cart.add_item(variant("prod_1", "var_2", 1200, 1), 1);
        cart.add_item(variant("prod_2", "var_3", 800, 1), 1);

        let variants: Vec<_> = cart
            .lines()
            .iter()
            .map(|line| line.variant_id.as_str())
            .collect();
        assert_eq!(variants, vec!["var_1", "var_2", "var_3"]);
    }

    #[test]
    fn test_add_item_respects_min_order() {
        let mut cart = CartAggregate::new();
        cart.add_item(variant("prod_1", "var_1", 1000, 3), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
    }

    #[test]
    fn test_subtotal() {
        let mut cart = CartAggregate::new();
        cart.add_item(variant("prod_1", "var_1", 1000, 1), 2);
        cart.add_item(variant("prod_2", "var_2", 550, 1), 1);

        let subtotal = cart.subtotal(CurrencyCode::USD);
        assert_eq!(subtotal, Money::from_minor_units(2550, CurrencyCode::USD));
    }

    #[test]
    fn test_subtotal_empty_cart_is_zero() {
        let cart = CartAggregate::new();
        assert_eq!(
            cart.subtotal(CurrencyCode::GBP),
            Money::zero(CurrencyCode::GBP)
        );
    }

    #[test]
    fn test_decrement_to_zero_removes_line() {
        let mut cart = CartAggregate::new();
        let line_id = cart.add_item(variant("prod_1", "var_1", 1000, 1), 1);
        cart.decrement(line_id).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_decrement_below_minimum_is_rejected() {
        let mut cart = CartAggregate::new();
        let line_id = cart.add_item(variant("prod_1", "var_1", 1000, 3), 3);

        let err = cart.decrement(line_id).unwrap_err();
        assert!(matches!(err, CartError::BelowMinimum { min: 3, .. }));
        // Line unchanged on failure.
        assert_eq!(cart.lines()[0].quantity, 3);
    }

    #[test]
    fn test_set_quantity_below_minimum_is_rejected() {
        let mut cart = CartAggregate::new();
        let line_id = cart.add_item(variant("prod_1", "var_1", 1000, 2), 4);

        assert!(cart.set_quantity(line_id, 1).is_err());
        assert_eq!(cart.lines()[0].quantity, 4);

        cart.set_quantity(line_id, 2).unwrap();
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn test_remove_item() {
        let mut cart = CartAggregate::new();
        let line_id = cart.add_item(variant("prod_1", "var_1", 1000, 5), 5);
        cart.remove_item(line_id).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.remove_item(line_id), Err(CartError::LineNotFound));
    }

    #[test]
    fn test_below_minimum_lines_surfaced() {
        let mut cart = CartAggregate::new();
        let line_id = cart.add_item(variant("prod_1", "var_1", 1000, 1), 4);
        cart.add_item(variant("prod_2", "var_2", 800, 1), 1);

        assert!(cart.below_minimum_lines().is_empty());

        // A later catalog change can raise min_order above an existing
        // line's quantity; the violation is surfaced, not clamped.
        cart.lines
            .iter_mut()
            .find(|line| line.id == line_id)
            .unwrap()
            .min_order = 6;
        let violations = cart.below_minimum_lines();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].id, line_id);
    }

    #[test]
    fn test_increment() {
        let mut cart = CartAggregate::new();
        let line_id = cart.add_item(variant("prod_1", "var_1", 1000, 1), 1);
        cart.increment(line_id).unwrap();
        assert_eq!(cart.total_quantity(), 2);
        assert!(cart.increment(LineId::generate()).is_err());
    }
}
