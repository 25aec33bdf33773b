//! Payment provider integration.
//!
//! The provider hosts the payment UI: we create a checkout session from
//! the cart and redirect the customer to it, then learn the outcome from
//! signed webhook events. Card data never touches this service.

mod client;
mod error;
mod types;
pub mod webhook;

pub use client::PaymentClient;
pub use error::PaymentError;
pub use types::{
    CheckoutSession, CreateSessionRequest, SessionLineItem, SessionMetadata, to_minor_units,
};
pub use webhook::{CompletedCheckout, PaymentEvent, WebhookError};
