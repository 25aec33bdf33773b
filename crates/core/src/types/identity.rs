//! Caller identity: a durable user or a transient guest.
//!
//! A request resolves to at most one identity. Guests are identified by an
//! opaque token carried in the session cookie; the token's validity window
//! is bounded by the session's expiry, not by anything in this type.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::UserId;

/// Errors that can occur when parsing a [`GuestToken`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum GuestTokenError {
    /// The input string is empty.
    #[error("guest token cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("guest token must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// An opaque guest identity token.
///
/// Minted lazily the first time an anonymous caller mutates a cart, and
/// stored in the session. The token itself carries no meaning; the cart
/// store keys guest carts by its value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct GuestToken(String);

impl GuestToken {
    /// Maximum length of a guest token (storage column bound).
    pub const MAX_LENGTH: usize = 100;

    /// Mint a fresh random guest token.
    #[must_use]
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a `GuestToken` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or longer than
    /// [`Self::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, GuestTokenError> {
        if s.is_empty() {
            return Err(GuestTokenError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(GuestTokenError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GuestToken {
    type Err = GuestTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The resolved caller of a request.
///
/// Exactly one owner kind: the storage layer keeps two nullable owner
/// columns, but in code "user or guest" is a sum type so a cart can never
/// be owned by both (or neither) at once. When a request carries both a
/// signed-in user and a guest token, the user takes precedence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// A signed-in user with a durable account.
    User {
        /// The user's ID.
        id: UserId,
    },
    /// An anonymous guest identified by an opaque session token.
    Guest {
        /// The guest's token.
        token: GuestToken,
    },
}

impl Identity {
    /// Identity for a signed-in user.
    #[must_use]
    pub const fn user(id: UserId) -> Self {
        Self::User { id }
    }

    /// Identity for a guest.
    #[must_use]
    pub const fn guest(token: GuestToken) -> Self {
        Self::Guest { token }
    }

    /// The user ID, if this identity is a signed-in user.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User { id } => Some(*id),
            Self::Guest { .. } => None,
        }
    }

    /// The guest token, if this identity is a guest.
    #[must_use]
    pub const fn guest_token(&self) -> Option<&GuestToken> {
        match self {
            Self::User { .. } => None,
            Self::Guest { token } => Some(token),
        }
    }

    /// Short tag for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Guest { .. } => "guest",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_is_unique() {
        assert_ne!(GuestToken::mint(), GuestToken::mint());
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(GuestToken::parse(""), Err(GuestTokenError::Empty)));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "x".repeat(GuestToken::MAX_LENGTH + 1);
        assert!(matches!(
            GuestToken::parse(&long),
            Err(GuestTokenError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_minted_roundtrip() {
        let token = GuestToken::mint();
        let parsed = GuestToken::parse(token.as_str()).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_identity_accessors() {
        let user_id = UserId::generate();
        let user = Identity::user(user_id);
        assert_eq!(user.user_id(), Some(user_id));
        assert!(user.guest_token().is_none());
        assert_eq!(user.kind(), "user");

        let token = GuestToken::mint();
        let guest = Identity::guest(token.clone());
        assert!(guest.user_id().is_none());
        assert_eq!(guest.guest_token(), Some(&token));
        assert_eq!(guest.kind(), "guest");
    }

    #[test]
    fn test_identity_serde_tagged() {
        let identity = Identity::user(UserId::generate());
        let json = serde_json::to_string(&identity).unwrap();
        assert!(json.contains("\"kind\":\"user\""));

        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);
    }
}
