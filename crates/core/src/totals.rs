//! Checkout total calculation.
//!
//! A pure function over priced line items. It is called when rendering a
//! cart summary, when creating a payment-provider checkout session, and
//! when materializing an order - all three must agree exactly for the same
//! lines, so there is no state and no I/O here.
//!
//! All arithmetic is fixed-point [`Decimal`]; tax is rounded half-up
//! (`MidpointAwayFromZero`) to cents.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::types::VariantPrice;

/// One priced line of a checkout.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutLine {
    /// Unit pricing for the line's variant.
    pub price: VariantPrice,
    /// Units purchased. Plain integer: merged cart lines may exceed the
    /// per-request cap.
    pub quantity: i32,
}

/// Computed totals for a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckoutTotals {
    /// Sum of effective unit price times quantity over all lines.
    pub subtotal: Decimal,
    /// Flat shipping, or zero at or above the free-shipping threshold.
    pub shipping: Decimal,
    /// Flat-rate sales tax on the subtotal, rounded to cents.
    pub tax: Decimal,
    /// `subtotal + shipping + tax`.
    pub total: Decimal,
}

/// Subtotal at or above this ships free.
fn free_shipping_threshold() -> Decimal {
    Decimal::new(7500, 2)
}

/// Flat shipping charged below the free-shipping threshold.
fn flat_shipping() -> Decimal {
    Decimal::new(999, 2)
}

/// Flat sales tax rate (8%).
fn tax_rate() -> Decimal {
    Decimal::new(8, 2)
}

/// Compute checkout totals for the given lines.
///
/// Deterministic and side-effect free: identical inputs always produce
/// identical totals regardless of call site.
#[must_use]
pub fn checkout_totals(lines: &[CheckoutLine]) -> CheckoutTotals {
    let subtotal: Decimal = lines
        .iter()
        .map(|line| line.price.effective() * Decimal::from(line.quantity))
        .sum();

    let shipping = if subtotal >= free_shipping_threshold() {
        Decimal::ZERO
    } else {
        flat_shipping()
    };

    let tax = (subtotal * tax_rate())
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    CheckoutTotals {
        subtotal,
        shipping,
        tax,
        total: subtotal + shipping + tax,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn line(price_cents: i64, sale_cents: Option<i64>, quantity: i32) -> CheckoutLine {
        CheckoutLine {
            price: VariantPrice::new(dec(price_cents), sale_cents.map(dec)),
            quantity,
        }
    }

    #[test]
    fn test_sale_prices_and_free_shipping() {
        // 50.00 x1 plus (30.00, on sale for 20.00) x2
        let lines = [line(5000, None, 1), line(3000, Some(2000), 2)];
        let totals = checkout_totals(&lines);

        assert_eq!(totals.subtotal, dec(9000));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.tax, dec(720));
        assert_eq!(totals.total, dec(9720));
    }

    #[test]
    fn test_free_shipping_threshold_boundary() {
        // Exactly 75.00 ships free
        let at = checkout_totals(&[line(7500, None, 1)]);
        assert_eq!(at.shipping, Decimal::ZERO);

        // 74.99 does not
        let below = checkout_totals(&[line(7499, None, 1)]);
        assert_eq!(below.shipping, dec(999));
    }

    #[test]
    fn test_flat_shipping_applied_to_total() {
        let totals = checkout_totals(&[line(1000, None, 1)]);
        assert_eq!(totals.subtotal, dec(1000));
        assert_eq!(totals.shipping, dec(999));
        assert_eq!(totals.tax, dec(80));
        assert_eq!(totals.total, dec(2079));
    }

    #[test]
    fn test_deterministic() {
        let lines = [line(1299, Some(999), 3), line(8950, None, 1)];
        assert_eq!(checkout_totals(&lines), checkout_totals(&lines));
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // Subtotal 10.0625 -> raw tax 0.805, which must round up to 0.81
        let lines = [CheckoutLine {
            price: VariantPrice::new(Decimal::new(100_625, 4), None),
            quantity: 1,
        }];
        let totals = checkout_totals(&lines);
        assert_eq!(totals.tax, dec(81));
    }

    #[test]
    fn test_empty_lines() {
        let totals = checkout_totals(&[]);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax, Decimal::ZERO);
    }
}
