//! Checkout service: cart to provider-hosted payment session.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use stride_core::totals::checkout_totals;
use stride_core::{Email, GuestToken, Identity};

use crate::models::CartLineDetail;
use crate::payments::{
    CheckoutSession, CreateSessionRequest, PaymentClient, PaymentError, SessionLineItem,
    SessionMetadata, to_minor_units,
};
use crate::store::{Store, StoreError};

/// Errors from checkout session creation.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The caller has no cart or an empty one; there is nothing to pay for.
    #[error("cart is empty")]
    EmptyCart,

    /// Payment provider failure.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Creates provider checkout sessions from carts.
pub struct CheckoutService {
    store: Arc<dyn Store>,
    payments: PaymentClient,
    base_url: String,
}

impl CheckoutService {
    /// Create a new checkout service. `base_url` is the storefront's
    /// public URL, used for the provider's redirect targets.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, payments: PaymentClient, base_url: String) -> Self {
        Self {
            store,
            payments,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Create a hosted checkout session for the caller's cart.
    ///
    /// A signed-in caller still holding a guest token (e.g. they signed in
    /// on another tab after filling a guest cart) gets that cart merged
    /// first, so the session always covers everything they selected.
    #[instrument(skip_all, fields(identity = identity.kind()))]
    pub async fn create_session(
        &self,
        identity: &Identity,
        lingering_guest: Option<&GuestToken>,
        customer_email: Option<&Email>,
    ) -> Result<CheckoutSession, CheckoutError> {
        if let (Some(user_id), Some(guest)) = (identity.user_id(), lingering_guest) {
            self.store.merge_carts(guest, user_id).await?;
        }

        let Some(cart) = self.store.find_cart(identity).await? else {
            return Err(CheckoutError::EmptyCart);
        };

        let lines = self.store.cart_lines_detailed(cart.id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let request = self.build_session_request(identity, customer_email, &lines)?;
        Ok(self.payments.create_checkout_session(&request).await?)
    }

    /// Assemble the provider request: one line item per cart line plus
    /// shipping and tax lines, amounts in minor units.
    ///
    /// Totals come from the same calculator the cart summary uses, so the
    /// amount the customer sees on the provider's page matches the summary
    /// they just left.
    fn build_session_request(
        &self,
        identity: &Identity,
        customer_email: Option<&Email>,
        lines: &[CartLineDetail],
    ) -> Result<CreateSessionRequest, CheckoutError> {
        let totals =
            checkout_totals(&lines.iter().map(CartLineDetail::as_checkout_line).collect::<Vec<_>>());

        let mut line_items = Vec::with_capacity(lines.len() + 2);
        for line in lines {
            let unit_price = line.pricing().effective();
            line_items.push(SessionLineItem {
                name: line.product_name.clone(),
                description: format!("{} / Size {}", line.color, line.size),
                unit_amount: to_minor_units(unit_price)
                    .ok_or(PaymentError::InvalidAmount(unit_price))?,
                quantity: i64::from(line.quantity),
                image_url: line.image_url.clone(),
            });
        }

        line_items.push(SessionLineItem {
            name: "Shipping".to_owned(),
            description: if totals.shipping.is_zero() {
                "Free shipping".to_owned()
            } else {
                "Standard shipping".to_owned()
            },
            unit_amount: to_minor_units(totals.shipping)
                .ok_or(PaymentError::InvalidAmount(totals.shipping))?,
            quantity: 1,
            image_url: None,
        });

        line_items.push(SessionLineItem {
            name: "Tax".to_owned(),
            description: "Sales tax (8%)".to_owned(),
            unit_amount: to_minor_units(totals.tax)
                .ok_or(PaymentError::InvalidAmount(totals.tax))?,
            quantity: 1,
            image_url: None,
        });

        Ok(CreateSessionRequest {
            line_items,
            success_url: format!(
                "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
                self.base_url
            ),
            cancel_url: format!("{}/cart", self.base_url),
            customer_email: customer_email.map(|e| e.as_str().to_owned()),
            metadata: SessionMetadata::from_identity(identity),
        })
    }
}
