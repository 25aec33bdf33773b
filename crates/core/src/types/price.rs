//! Variant pricing using decimal arithmetic.
//!
//! Amounts are stored in the currency's natural unit (e.g., `44.99`, not
//! `4499` cents) as `NUMERIC`-backed [`Decimal`] values. Conversion to
//! minor units happens only at the payment-provider boundary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A variant's listed price and optional sale price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPrice {
    /// Regular unit price.
    pub price: Decimal,
    /// Discounted unit price, if the variant is on sale.
    pub sale_price: Option<Decimal>,
}

impl VariantPrice {
    /// Create a new price pair.
    #[must_use]
    pub const fn new(price: Decimal, sale_price: Option<Decimal>) -> Self {
        Self { price, sale_price }
    }

    /// The price the customer actually pays: the sale price when present
    /// and lower than the regular price, otherwise the regular price.
    #[must_use]
    pub fn effective(&self) -> Decimal {
        match self.sale_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn test_effective_without_sale() {
        let price = VariantPrice::new(dec(4999), None);
        assert_eq!(price.effective(), dec(4999));
    }

    #[test]
    fn test_effective_with_lower_sale() {
        let price = VariantPrice::new(dec(4999), Some(dec(2999)));
        assert_eq!(price.effective(), dec(2999));
    }

    #[test]
    fn test_effective_ignores_higher_sale() {
        // A "sale" above the list price never applies
        let price = VariantPrice::new(dec(4999), Some(dec(5999)));
        assert_eq!(price.effective(), dec(4999));
    }
}
