//! Session-related types.
//!
//! Types stored in the session for authentication and guest identity.

use serde::{Deserialize, Serialize};

use stride_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

/// Session keys for identity data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the opaque guest identity token.
    ///
    /// Minted lazily on the first cart mutation by an anonymous caller and
    /// removed when its cart is merged into a user cart. Its validity
    /// window is the session's 7-day expiry.
    pub const GUEST_TOKEN: &str = "guest_token";
}
