//! Business services over the durable store.

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService};
pub use checkout::{CheckoutError, CheckoutService};
pub use orders::{Materialized, OrderError, OrderService};
