//! Durable-store abstraction.
//!
//! The storefront's only shared resource is the durable store behind this
//! trait. Two backends exist:
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx, the production backend
//! - [`MemoryStore`] - in-process maps for local development and tests
//!
//! The backend is selected once at startup from configuration. There is no
//! request-time fallback from one to the other: a failing database surfaces
//! as an error, never as fabricated empty data.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use stride_core::{CartId, CartLineId, Email, GuestToken, Identity, OrderId, OrderStatus, UserId, VariantId};

use crate::models::{Cart, CartLine, CartLineDetail, OrderWithLines, User, VariantRecord};

/// Errors that can occur during store operations.
///
/// `NotFound` and `Conflict` are distinct from `Database` so callers can
/// tell "genuinely absent" apart from "backend failing", and can
/// reinterpret uniqueness violations where the operation calls for it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate external session id).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Outcome of merging a guest cart into a user cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The guest had no cart; nothing happened.
    NothingToMerge,
    /// The guest cart was folded into the user cart and deleted.
    Merged {
        /// Number of guest lines migrated (moved or summed into existing lines).
        lines_moved: u64,
    },
}

/// A new order to persist, with its frozen line snapshot.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner: Identity,
    pub external_session_id: String,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub lines: Vec<NewOrderLine>,
}

/// One line of a new order: quantity and effective price at this instant.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub variant_id: VariantId,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
}

/// The durable store behind the cart, order, user, and catalog flows.
///
/// Contract notes for implementors:
///
/// - `get_or_create_cart` must be safe to call concurrently for the same
///   identity without creating duplicate carts.
/// - `upsert_line` must be an atomic increment-by-delta on
///   `(cart, variant)` so concurrent adds and re-run merges converge
///   instead of losing updates.
/// - `merge_carts` must be all-or-nothing where the backend supports
///   transactions, and re-entrant either way: re-running a merge after a
///   partial failure must not double any quantity.
/// - `create_order` must reject a duplicate `external_session_id` with
///   [`StoreError::Conflict`].
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Carts
    // =========================================================================

    /// Find the cart owned by `owner`, if any.
    async fn find_cart(&self, owner: &Identity) -> Result<Option<Cart>, StoreError>;

    /// Return the cart owned by `owner`, creating an empty one if absent.
    async fn get_or_create_cart(&self, owner: &Identity) -> Result<Cart, StoreError>;

    /// All lines of a cart, newest first.
    async fn cart_lines(&self, cart: CartId) -> Result<Vec<CartLine>, StoreError>;

    /// All lines of a cart resolved with display and pricing data, newest
    /// first.
    async fn cart_lines_detailed(&self, cart: CartId) -> Result<Vec<CartLineDetail>, StoreError>;

    /// Insert a line for `variant`, or atomically increment an existing
    /// line's quantity by `delta`. Returns the affected line's id.
    async fn upsert_line(
        &self,
        cart: CartId,
        variant: VariantId,
        delta: i32,
    ) -> Result<CartLineId, StoreError>;

    /// Set the quantity of a line within `cart`.
    ///
    /// Returns [`StoreError::NotFound`] if the line does not exist in that
    /// cart.
    async fn set_line_quantity(
        &self,
        cart: CartId,
        line: CartLineId,
        quantity: i32,
    ) -> Result<(), StoreError>;

    /// Delete a line within `cart`. Removing an absent line is a no-op.
    async fn remove_line(&self, cart: CartId, line: CartLineId) -> Result<(), StoreError>;

    /// Delete all lines of a cart. The cart row itself persists. Idempotent.
    async fn clear_cart(&self, cart: CartId) -> Result<(), StoreError>;

    /// Fold the guest's cart into the user's cart: quantities summed per
    /// variant, other lines moved, guest cart deleted afterwards.
    async fn merge_carts(
        &self,
        guest: &GuestToken,
        user: UserId,
    ) -> Result<MergeOutcome, StoreError>;

    // =========================================================================
    // Catalog (read-only reference data)
    // =========================================================================

    /// Look up a variant with its display and pricing data.
    async fn variant(&self, id: VariantId) -> Result<Option<VariantRecord>, StoreError>;

    // =========================================================================
    // Orders
    // =========================================================================

    /// Persist an order and its line snapshot atomically.
    ///
    /// Returns [`StoreError::Conflict`] if an order already exists for the
    /// same external session id.
    async fn create_order(&self, order: NewOrder) -> Result<OrderId, StoreError>;

    /// Fetch an order with resolved lines.
    async fn order(&self, id: OrderId) -> Result<Option<OrderWithLines>, StoreError>;

    /// Fetch an order by the payment provider's session id.
    async fn order_by_external_session(
        &self,
        session_id: &str,
    ) -> Result<Option<OrderWithLines>, StoreError>;

    // =========================================================================
    // Users
    // =========================================================================

    /// Create a user with a password hash.
    ///
    /// Returns [`StoreError::Conflict`] if the email is already registered.
    async fn create_user(&self, email: &Email, password_hash: &str) -> Result<User, StoreError>;

    /// Fetch a user and their password hash by email, if both exist.
    async fn user_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, StoreError>;

    // =========================================================================
    // Health
    // =========================================================================

    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
