//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server faults to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`; service errors convert into it with their
//! user-facing status already decided.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::payments::{PaymentError, WebhookError};
use crate::services::{AuthError, CartError, CheckoutError, OrderError};
use crate::store::StoreError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Durable store operation failed.
    #[error("store error: {0}")]
    Store(StoreError),

    /// Payment provider operation failed.
    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Conflict with existing state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound("not found".to_owned()),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Store(other),
        }
    }
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::UnknownVariant(id) => Self::BadRequest(format!("unknown variant: {id}")),
            CartError::LineNotFound(id) => Self::NotFound(format!("cart line not found: {id}")),
            CartError::Store(store) => store.into(),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::EmptyCart => Self::BadRequest("cart is empty".to_owned()),
            CheckoutError::Payment(payment) => Self::Payment(payment),
            CheckoutError::Store(store) => store.into(),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            // A lost cart behind a completed payment is an anomaly: fail
            // the webhook so the provider retries, and capture it.
            OrderError::MissingCart { session_id } => {
                Self::Internal(format!("no cart to materialize for session {session_id}"))
            }
            OrderError::Store(store) => store.into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => Self::Unauthorized("invalid credentials".to_owned()),
            AuthError::UserAlreadyExists => {
                Self::Conflict("an account with this email already exists".to_owned())
            }
            AuthError::InvalidEmail(_) => Self::BadRequest("invalid email address".to_owned()),
            AuthError::WeakPassword(msg) => Self::BadRequest(msg),
            AuthError::PasswordHash => Self::Internal("password hashing failed".to_owned()),
            AuthError::Store(store) => store.into(),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(e: WebhookError) -> Self {
        // Signature and payload failures are the sender's problem
        Self::BadRequest(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Store(_) | Self::Internal(_) | Self::Payment(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Payment(_) => "Payment provider error".to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
