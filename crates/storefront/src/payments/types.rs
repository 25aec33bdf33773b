//! Payment provider API types.
//!
//! Amounts cross this boundary in minor units (cents); everything inside
//! the service is `Decimal` in natural units.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use stride_core::{GuestToken, Identity, UserId};

/// Convert a natural-unit amount to minor units (e.g., `9.99` -> `999`).
///
/// Returns `None` if the amount does not fit in an `i64` after scaling.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp(0)
        .to_i64()
}

/// Request body for creating a provider-hosted checkout session.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    pub metadata: SessionMetadata,
}

/// One display line of the provider's hosted checkout page.
#[derive(Debug, Clone, Serialize)]
pub struct SessionLineItem {
    pub name: String,
    pub description: String,
    /// Unit amount in minor units.
    pub unit_amount: i64,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Opaque metadata round-tripped through the provider.
///
/// Carries the cart owner from session creation to the completion webhook,
/// so materializing the order does not depend on any cookie being present
/// on the webhook request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_token: Option<String>,
}

impl SessionMetadata {
    /// Encode a cart owner into metadata.
    #[must_use]
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id(),
            guest_token: identity.guest_token().map(|t| t.as_str().to_owned()),
        }
    }

    /// Decode the cart owner, if the metadata carries a valid one.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        if let Some(id) = self.user_id {
            return Some(Identity::user(id));
        }
        let token = GuestToken::parse(self.guest_token.as_deref()?).ok()?;
        Some(Identity::guest(token))
    }
}

/// A created checkout session: the id becomes the order idempotency key,
/// the URL is where the customer pays.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(999, 2)), Some(999));
        assert_eq!(to_minor_units(Decimal::new(7500, 2)), Some(7500));
        assert_eq!(to_minor_units(Decimal::ZERO), Some(0));
    }

    #[test]
    fn test_metadata_roundtrip_user() {
        let identity = Identity::user(UserId::generate());
        let metadata = SessionMetadata::from_identity(&identity);
        assert_eq!(metadata.identity(), Some(identity));
    }

    #[test]
    fn test_metadata_roundtrip_guest() {
        let identity = Identity::guest(GuestToken::mint());
        let metadata = SessionMetadata::from_identity(&identity);
        assert_eq!(metadata.identity(), Some(identity));
    }

    #[test]
    fn test_empty_metadata_has_no_identity() {
        assert_eq!(SessionMetadata::default().identity(), None);
    }
}
