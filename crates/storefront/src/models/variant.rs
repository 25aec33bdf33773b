//! Product variant reference data.

use rust_decimal::Decimal;
use serde::Serialize;

use stride_core::{ProductId, VariantId, VariantPrice};

/// Read-only reference data for a purchasable variant (one size/color of a
/// product), resolved from the catalog.
///
/// The cart and order flows look variants up but never mutate them; stock
/// bookkeeping belongs to fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct VariantRecord {
    pub id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub color: String,
    pub size: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub in_stock: i32,
}

impl VariantRecord {
    /// Unit pricing for this variant.
    #[must_use]
    pub const fn pricing(&self) -> VariantPrice {
        VariantPrice::new(self.price, self.sale_price)
    }
}
