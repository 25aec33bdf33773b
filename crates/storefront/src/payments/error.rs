//! Payment provider error types.

use thiserror::Error;

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request.
    #[error("provider returned {status}: {message}")]
    Provider {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider error body, verbatim.
        message: String,
    },

    /// An amount could not be represented in minor units.
    #[error("amount not representable in minor units: {0}")]
    InvalidAmount(rust_decimal::Decimal),
}
