//! Payment provider webhook intake.
//!
//! Signature verification happens here, strictly before any state
//! transition. A non-2xx response makes the provider redeliver, so
//! materialization failures are surfaced, while duplicate deliveries
//! resolve to 200 via the materializer's idempotency.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::payments::webhook::{self, SIGNATURE_HEADER};
use crate::payments::PaymentEvent;
use crate::services::{Materialized, OrderService};
use crate::state::AppState;

/// Handle a signed payment provider event.
#[instrument(skip_all)]
pub async fn payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing signature header".to_owned()))?;

    let payment = &state.config().payment;
    webhook::verify_signature(
        payment.webhook_secret.expose_secret().as_bytes(),
        signature,
        &body,
        unix_now(),
        payment.webhook_tolerance_secs,
    )?;

    match webhook::parse_event(&body)? {
        PaymentEvent::CheckoutCompleted(completed) => {
            let orders = OrderService::new(state.store());
            match orders.process_completed_checkout(&completed).await? {
                Materialized::Created(order) => {
                    tracing::info!(order_id = %order.id, session_id = %completed.session_id, "order created");
                }
                Materialized::AlreadyProcessed(order) => {
                    tracing::info!(order_id = %order.id, session_id = %completed.session_id, "event already processed");
                }
            }
        }
        PaymentEvent::PaymentFailed { session_id } => {
            tracing::warn!(%session_id, "payment failed");
        }
        PaymentEvent::Unhandled { kind } => {
            tracing::debug!(kind = %kind, "unhandled event type");
        }
    }

    Ok(StatusCode::OK)
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}
