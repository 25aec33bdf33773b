//! Cart and cart line models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use stride_core::totals::CheckoutLine;
use stride_core::{CartId, CartLineId, Identity, ProductId, VariantId, VariantPrice};

/// A cart: the mutable pre-purchase selection of items for one identity.
///
/// At most one non-deleted cart exists per identity; callers look carts up
/// by owner, never by cart id.
#[derive(Debug, Clone)]
pub struct Cart {
    pub id: CartId,
    pub owner: Identity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One variant selection within a cart.
///
/// `variant_id` is unique within a cart: adding an already-present variant
/// increments the existing line instead of creating a duplicate.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub id: CartLineId,
    pub cart_id: CartId,
    pub variant_id: VariantId,
    pub quantity: i32,
}

/// A cart line joined with the display and pricing data needed to render
/// or price it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CartLineDetail {
    pub id: CartLineId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub color: String,
    pub size: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub quantity: i32,
    pub in_stock: i32,
}

impl CartLineDetail {
    /// Unit pricing for this line.
    #[must_use]
    pub const fn pricing(&self) -> VariantPrice {
        VariantPrice::new(self.price, self.sale_price)
    }

    /// This line as input to the checkout total calculator.
    #[must_use]
    pub const fn as_checkout_line(&self) -> CheckoutLine {
        CheckoutLine {
            price: self.pricing(),
            quantity: self.quantity,
        }
    }
}
