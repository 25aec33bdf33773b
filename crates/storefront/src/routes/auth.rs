//! Authentication route handlers.
//!
//! Sign-in and sign-up fold the caller's guest cart into their user cart
//! before responding, so the very next cart read reflects the merged
//! state.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use stride_core::{Email, UserId};

use crate::error::{AppError, Result};
use crate::middleware::{clear_current_user, current_user, guest_token, set_current_user, take_guest_token};
use crate::models::{CurrentUser, User};
use crate::services::{AuthService, CartService};
use crate::state::AppState;

/// Register request body.
#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// Signed-in user response body.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub email: Email,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

/// Sign in the session and merge any guest cart into the user's cart.
async fn establish_session(state: &AppState, session: &Session, user: &User) -> Result<()> {
    set_current_user(
        session,
        &CurrentUser {
            id: user.id,
            email: user.email.clone(),
        },
    )
    .await?;

    if let Some(token) = guest_token(session).await {
        CartService::new(state.store())
            .merge_guest_cart(&token, user.id)
            .await?;
        take_guest_token(session).await?;
    }

    Ok(())
}

/// Register a new account.
#[instrument(skip(state, session, body))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<UserView>)> {
    let user = AuthService::new(state.store())
        .register(&body.email, &body.password)
        .await?;

    establish_session(&state, &session, &user).await?;

    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

/// Log in to an existing account.
#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginBody>,
) -> Result<Json<UserView>> {
    let user = AuthService::new(state.store())
        .login(&body.email, &body.password)
        .await?;

    establish_session(&state, &session, &user).await?;

    Ok(Json(UserView::from(&user)))
}

/// Log out.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in user, if any.
#[instrument(skip(session))]
pub async fn me(session: Session) -> Result<Json<UserView>> {
    let user = current_user(&session)
        .await
        .ok_or_else(|| AppError::Unauthorized("not signed in".to_owned()))?;

    Ok(Json(UserView {
        id: user.id,
        email: user.email,
    }))
}
