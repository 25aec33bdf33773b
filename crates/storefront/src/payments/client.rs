//! HTTP client for the payment provider's checkout API.

use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use super::error::PaymentError;
use super::types::{CheckoutSession, CreateSessionRequest};
use crate::config::PaymentConfig;

/// Client for the provider's REST API.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

impl std::fmt::Debug for PaymentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl PaymentClient {
    /// Create a new client from configuration.
    #[must_use]
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            secret_key: config.secret_key.clone(),
        }
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Http`] on transport failure and
    /// [`PaymentError::Provider`] when the provider rejects the request.
    #[instrument(skip(self, request), fields(lines = request.line_items.len()))]
    pub async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Provider { status, message });
        }

        Ok(response.json().await?)
    }
}
