//! Checkout route handler.

use axum::{Json, extract::State};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::{ResolvedIdentity, current_user, guest_token, take_guest_token};
use crate::services::CheckoutService;
use crate::state::AppState;

/// Checkout session creation response.
#[derive(Debug, Serialize)]
pub struct CheckoutRedirect {
    /// Provider-hosted payment page to redirect the customer to.
    pub checkout_url: String,
    /// The provider's session id.
    pub session_id: String,
}

/// Create a provider checkout session for the caller's cart and return the
/// redirect target.
#[instrument(skip(state, session, identity))]
pub async fn create_session(
    State(state): State<AppState>,
    session: Session,
    ResolvedIdentity(identity): ResolvedIdentity,
) -> Result<Json<CheckoutRedirect>> {
    // No identity means no cart was ever provisioned
    let Some(identity) = identity else {
        return Err(AppError::BadRequest("cart is empty".to_owned()));
    };

    let lingering_guest = if identity.user_id().is_some() {
        guest_token(&session).await
    } else {
        None
    };

    let email = current_user(&session).await.map(|u| u.email);

    let checkout = CheckoutService::new(
        state.store(),
        state.payments().clone(),
        state.config().base_url.clone(),
    );
    let created = checkout
        .create_session(&identity, lingering_guest.as_ref(), email.as_ref())
        .await?;

    // The guest cart is merged away now; retire the guest identity
    if lingering_guest.is_some() {
        take_guest_token(&session).await?;
    }

    Ok(Json(CheckoutRedirect {
        checkout_url: created.url,
        session_id: created.id,
    }))
}
