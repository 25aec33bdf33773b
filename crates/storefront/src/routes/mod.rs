//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (pings the store)
//!
//! # Cart (JSON)
//! GET    /cart                 - Cart with display data and totals
//! POST   /cart/items           - Add item (creates cart and guest identity on demand)
//! PATCH  /cart/items/{id}      - Update line quantity
//! DELETE /cart/items/{id}      - Remove line (idempotent)
//! DELETE /cart                 - Clear cart (idempotent)
//!
//! # Checkout
//! POST /checkout/session       - Create provider checkout session, returns redirect URL
//!
//! # Orders
//! GET  /orders/{id}            - Order with lines
//! GET  /orders/by-session/{id} - Order lookup for the success page
//!
//! # Auth
//! POST /auth/register          - Register (merges guest cart)
//! POST /auth/login             - Login (merges guest cart)
//! POST /auth/logout            - Logout
//! GET  /auth/me                - Current user
//!
//! # Webhooks
//! POST /webhooks/payment       - Signed payment provider events
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route(
            "/items/{id}",
            axum::routing::patch(cart::update).delete(cart::remove),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(orders::show))
        .route("/by-session/{session_id}", get(orders::by_session))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .route("/checkout/session", post(checkout::create_session))
        .nest("/orders", order_routes())
        .nest("/auth", auth_routes())
        .route("/webhooks/payment", post(webhooks::payment))
}
