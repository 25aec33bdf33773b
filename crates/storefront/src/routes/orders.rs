//! Order lookup route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use stride_core::{OrderId, OrderStatus};

use crate::error::{AppError, Result};
use crate::models::{OrderLineDetail, OrderWithLines};
use crate::services::OrderService;
use crate::state::AppState;

/// Order display data.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderLineDetail>,
}

impl From<OrderWithLines> for OrderView {
    fn from(with_lines: OrderWithLines) -> Self {
        Self {
            id: with_lines.order.id,
            status: with_lines.order.status,
            total_amount: with_lines.order.total_amount,
            created_at: with_lines.order.created_at,
            items: with_lines.lines,
        }
    }
}

/// Fetch an order by id.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderView>> {
    let order = OrderService::new(state.store())
        .order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order not found: {id}")))?;

    Ok(Json(OrderView::from(order)))
}

/// Fetch an order by the payment provider's session id.
///
/// The success page lands with `?session_id=...` and calls this to render
/// the confirmation.
#[instrument(skip(state))]
pub async fn by_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<OrderView>> {
    let order = OrderService::new(state.store())
        .order_for_session(&session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no order for session: {session_id}")))?;

    Ok(Json(OrderView::from(order)))
}
