//! Order models: the immutable, purchased counterpart of a cart.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use stride_core::{Identity, OrderId, OrderLineId, OrderStatus, VariantId};

/// An immutable record of a completed purchase.
///
/// `external_session_id` is the payment provider's identifier for the
/// checkout attempt and is unique: at most one order is ever created per
/// session, no matter how often the completion event is delivered.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub owner: Identity,
    pub external_session_id: String,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A frozen snapshot of a cart line at purchase time.
///
/// `price_at_purchase` captures the effective price the customer actually
/// paid, independent of later price changes to the variant.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub variant_id: VariantId,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
}

/// An order line joined with display data for the order view.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderLineDetail {
    pub id: OrderLineId,
    pub variant_id: VariantId,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub product_name: String,
    pub image_url: Option<String>,
    pub color: String,
    pub size: String,
}

/// An order together with its resolved lines.
#[derive(Debug, Clone)]
pub struct OrderWithLines {
    pub order: Order,
    pub lines: Vec<OrderLineDetail>,
}
