//! Identity resolution from the session.
//!
//! A request resolves to at most one identity: the signed-in user when
//! present, otherwise the guest token, otherwise nothing. Read paths treat
//! "nothing" as an empty cart; mutation paths mint a guest token on
//! demand.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use stride_core::{GuestToken, Identity};

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};

/// Extractor resolving the caller's identity, if any.
///
/// Never rejects: anonymous requests resolve to `None`.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(
///     ResolvedIdentity(identity): ResolvedIdentity,
/// ) -> impl IntoResponse {
///     match identity {
///         Some(id) => format!("hello, {}", id.kind()),
///         None => "hello, anonymous".to_string(),
///     }
/// }
/// ```
pub struct ResolvedIdentity(pub Option<Identity>);

impl<S> FromRequestParts<S> for ResolvedIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self(None));
        };

        Ok(Self(resolve(session).await))
    }
}

/// Resolve the session to an identity: user over guest.
async fn resolve(session: &Session) -> Option<Identity> {
    if let Some(user) = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
    {
        return Some(Identity::user(user.id));
    }

    let token = session
        .get::<GuestToken>(session_keys::GUEST_TOKEN)
        .await
        .ok()
        .flatten()?;
    Some(Identity::guest(token))
}

/// Resolve the caller's identity, minting a guest token when they have
/// none yet.
///
/// Cart mutations call this: a first-time anonymous visitor's add-to-cart
/// both creates their guest identity and their cart.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session cannot be read or written.
pub async fn resolve_or_mint_guest(session: &Session) -> Result<Identity, AppError> {
    if let Some(identity) = resolve(session).await {
        return Ok(identity);
    }

    let token = GuestToken::mint();
    session
        .insert(session_keys::GUEST_TOKEN, token.clone())
        .await
        .map_err(session_error)?;

    Ok(Identity::guest(token))
}

/// The signed-in user, if any.
pub async fn current_user(session: &Session) -> Option<CurrentUser> {
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Store the signed-in user in the session.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session cannot be modified.
pub async fn set_current_user(session: &Session, user: &CurrentUser) -> Result<(), AppError> {
    session
        .insert(session_keys::CURRENT_USER, user)
        .await
        .map_err(session_error)
}

/// Clear the signed-in user from the session (logout).
///
/// # Errors
///
/// Returns `AppError::Internal` if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), AppError> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .map_err(session_error)?;
    Ok(())
}

/// The guest token, if the session holds one. Does not remove it.
pub async fn guest_token(session: &Session) -> Option<GuestToken> {
    session
        .get::<GuestToken>(session_keys::GUEST_TOKEN)
        .await
        .ok()
        .flatten()
}

/// Remove and return the guest token, if the session holds one.
///
/// The auth flow calls this after sign-in/sign-up: the returned token
/// drives the cart merge, and removing it retires the guest identity.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session cannot be modified.
pub async fn take_guest_token(session: &Session) -> Result<Option<GuestToken>, AppError> {
    session
        .remove::<GuestToken>(session_keys::GUEST_TOKEN)
        .await
        .map_err(session_error)
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {e}"))
}
