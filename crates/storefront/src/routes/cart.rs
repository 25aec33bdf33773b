//! Cart route handlers.
//!
//! All endpoints are JSON. Reads work for anonymous callers (an empty
//! cart, never an error); the add endpoint mints a guest identity on
//! demand so a first-time visitor's add-to-cart just works.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use stride_core::totals::{CheckoutTotals, checkout_totals};
use stride_core::{CartLineId, Quantity, VariantId};

use crate::error::Result;
use crate::middleware::{ResolvedIdentity, resolve_or_mint_guest};
use crate::models::CartLineDetail;
use crate::services::CartService;
use crate::state::AppState;

/// Cart line display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub id: CartLineId,
    pub variant_id: VariantId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub color: String,
    pub size: String,
    pub unit_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub quantity: i32,
    pub line_total: Decimal,
    pub in_stock: i32,
}

impl From<&CartLineDetail> for CartItemView {
    fn from(line: &CartLineDetail) -> Self {
        let effective = line.pricing().effective();
        Self {
            id: line.id,
            variant_id: line.variant_id,
            product_name: line.product_name.clone(),
            image_url: line.image_url.clone(),
            color: line.color.clone(),
            size: line.size.clone(),
            unit_price: line.price,
            sale_price: line.sale_price,
            quantity: line.quantity,
            line_total: effective * Decimal::from(line.quantity),
            in_stock: line.in_stock,
        }
    }
}

/// Full cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: i32,
    pub totals: CheckoutTotals,
}

impl CartView {
    fn from_lines(lines: &[CartLineDetail]) -> Self {
        let totals = checkout_totals(
            &lines
                .iter()
                .map(CartLineDetail::as_checkout_line)
                .collect::<Vec<_>>(),
        );

        Self {
            items: lines.iter().map(CartItemView::from).collect(),
            item_count: lines.iter().map(|l| l.quantity).sum(),
            totals,
        }
    }
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddItemBody {
    pub variant_id: VariantId,
    /// Defaults to 1; values outside 1..=10 are rejected at parse time.
    pub quantity: Option<Quantity>,
}

/// Update cart line request body. Only provided fields change.
#[derive(Debug, Deserialize)]
pub struct UpdateItemBody {
    pub quantity: Option<Quantity>,
}

/// Add to cart response body.
#[derive(Debug, Serialize)]
pub struct AddItemResponse {
    pub line_id: CartLineId,
}

/// Show the caller's cart.
#[instrument(skip(state, identity))]
pub async fn show(
    State(state): State<AppState>,
    ResolvedIdentity(identity): ResolvedIdentity,
) -> Result<Json<CartView>> {
    let lines = CartService::new(state.store())
        .cart_for(identity.as_ref())
        .await?;

    Ok(Json(CartView::from_lines(&lines)))
}

/// Add an item to the caller's cart, creating cart and guest identity as
/// needed.
#[instrument(skip(state, session, body))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AddItemBody>,
) -> Result<impl IntoResponse> {
    let identity = resolve_or_mint_guest(&session).await?;

    let line_id = CartService::new(state.store())
        .add_item(&identity, body.variant_id, body.quantity.unwrap_or(Quantity::ONE))
        .await?;

    Ok((StatusCode::CREATED, Json(AddItemResponse { line_id })))
}

/// Update a cart line's quantity.
#[instrument(skip(state, identity, body))]
pub async fn update(
    State(state): State<AppState>,
    ResolvedIdentity(identity): ResolvedIdentity,
    Path(line_id): Path<CartLineId>,
    Json(body): Json<UpdateItemBody>,
) -> Result<Json<CartView>> {
    let Some(identity) = identity else {
        return Err(crate::error::AppError::NotFound(format!(
            "cart line not found: {line_id}"
        )));
    };

    let carts = CartService::new(state.store());
    carts.update_item(&identity, line_id, body.quantity).await?;

    let lines = carts.cart_for(Some(&identity)).await?;
    Ok(Json(CartView::from_lines(&lines)))
}

/// Remove a cart line. Removing an absent line succeeds.
#[instrument(skip(state, identity))]
pub async fn remove(
    State(state): State<AppState>,
    ResolvedIdentity(identity): ResolvedIdentity,
    Path(line_id): Path<CartLineId>,
) -> Result<Json<CartView>> {
    let carts = CartService::new(state.store());

    let Some(identity) = identity else {
        return Ok(Json(CartView::from_lines(&[])));
    };

    carts.remove_item(&identity, line_id).await?;

    let lines = carts.cart_for(Some(&identity)).await?;
    Ok(Json(CartView::from_lines(&lines)))
}

/// Clear the caller's cart.
#[instrument(skip(state, identity))]
pub async fn clear(
    State(state): State<AppState>,
    ResolvedIdentity(identity): ResolvedIdentity,
) -> Result<StatusCode> {
    if let Some(identity) = identity {
        CartService::new(state.store()).clear(&identity).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}
