//! Cart service: identity-scoped cart reads and mutations.
//!
//! Operations return results rather than panicking or throwing so the
//! route layer can react without exception-based control flow. Read paths
//! treat "no identity" and "no cart yet" as an empty cart, never as an
//! error.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use stride_core::{CartLineId, GuestToken, Identity, Quantity, UserId, VariantId};

use crate::models::CartLineDetail;
use crate::store::{MergeOutcome, Store, StoreError};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The variant does not exist, so no price or stock data can be
    /// resolved for the new line.
    #[error("unknown variant: {0}")]
    UnknownVariant(VariantId),

    /// The referenced cart line does not exist for this caller.
    #[error("cart line not found: {0}")]
    LineNotFound(CartLineId),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cart operations scoped to a resolved identity.
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    /// Create a new cart service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The caller's cart lines with display data, newest first.
    ///
    /// Returns an empty list - not an error - when the caller has no
    /// identity yet or no cart yet.
    #[instrument(skip(self, identity))]
    pub async fn cart_for(
        &self,
        identity: Option<&Identity>,
    ) -> Result<Vec<CartLineDetail>, CartError> {
        let Some(identity) = identity else {
            return Ok(Vec::new());
        };

        let Some(cart) = self.store.find_cart(identity).await? else {
            return Ok(Vec::new());
        };

        Ok(self.store.cart_lines_detailed(cart.id).await?)
    }

    /// Add `quantity` of a variant to the caller's cart, creating the cart
    /// if this is the caller's first add. An existing line for the same
    /// variant is incremented rather than duplicated. Returns the affected
    /// line's id.
    #[instrument(skip(self, identity), fields(identity = identity.kind()))]
    pub async fn add_item(
        &self,
        identity: &Identity,
        variant_id: VariantId,
        quantity: Quantity,
    ) -> Result<CartLineId, CartError> {
        if self.store.variant(variant_id).await?.is_none() {
            return Err(CartError::UnknownVariant(variant_id));
        }

        let cart = self.store.get_or_create_cart(identity).await?;
        Ok(self
            .store
            .upsert_line(cart.id, variant_id, quantity.get())
            .await?)
    }

    /// Update a line in the caller's cart. Only provided fields change;
    /// passing no quantity is a no-op.
    #[instrument(skip(self, identity), fields(identity = identity.kind()))]
    pub async fn update_item(
        &self,
        identity: &Identity,
        line: CartLineId,
        quantity: Option<Quantity>,
    ) -> Result<(), CartError> {
        let Some(quantity) = quantity else {
            return Ok(());
        };

        let Some(cart) = self.store.find_cart(identity).await? else {
            return Err(CartError::LineNotFound(line));
        };

        self.store
            .set_line_quantity(cart.id, line, quantity.get())
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CartError::LineNotFound(line),
                other => CartError::Store(other),
            })
    }

    /// Remove a line from the caller's cart. Removing a line that does not
    /// exist (anymore) is a silent no-op.
    #[instrument(skip(self, identity), fields(identity = identity.kind()))]
    pub async fn remove_item(
        &self,
        identity: &Identity,
        line: CartLineId,
    ) -> Result<(), CartError> {
        let Some(cart) = self.store.find_cart(identity).await? else {
            return Ok(());
        };

        Ok(self.store.remove_line(cart.id, line).await?)
    }

    /// Delete all lines from the caller's cart. Idempotent.
    #[instrument(skip(self, identity), fields(identity = identity.kind()))]
    pub async fn clear(&self, identity: &Identity) -> Result<(), CartError> {
        let Some(cart) = self.store.find_cart(identity).await? else {
            return Ok(());
        };

        Ok(self.store.clear_cart(cart.id).await?)
    }

    /// Fold a guest's cart into a user's cart after authentication.
    ///
    /// Called by the auth flow before its response is returned, so the
    /// next cart read reflects the merged state.
    #[instrument(skip(self, guest))]
    pub async fn merge_guest_cart(
        &self,
        guest: &GuestToken,
        user: UserId,
    ) -> Result<MergeOutcome, CartError> {
        Ok(self.store.merge_carts(guest, user).await?)
    }
}
