//! Stripe API client implementation.

use reqwest::Client;
use std::time::Duration;

use crav_core::{CreditPack, UserId};

use super::types::{CheckoutSession, StripeErrorResponse, WebhookEvent};
use crate::crypto::{constant_time_eq, hmac_sha256_hex};

/// Maximum age of a signed webhook, in seconds.
pub const WEBHOOK_TOLERANCE_SECONDS: i64 = 300;

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Payload could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Signature header missing parts or no `v1` matched.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Signed timestamp outside the tolerance window.
    #[error("Webhook timestamp outside tolerance")]
    StaleTimestamp,
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// `base_url` is normally `https://api.stripe.com/v1`.
    ///
    /// # Errors
    ///
    /// `StripeError::Http` if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, StripeError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a Checkout session selling one credit pack.
    ///
    /// The session metadata carries `user_id`, `pack` and `credits` so the
    /// `checkout.session.completed` webhook can grant the right amount.
    ///
    /// # Errors
    ///
    /// `StripeError::Api` if Stripe rejects the request.
    pub async fn create_checkout_session(
        &self,
        user_id: &UserId,
        pack: &CreditPack,
        customer_id: Option<&str>,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let user = user_id.to_string();
        let mut params = vec![
            ("mode", "payment".to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
            ("client_reference_id", user.clone()),
            ("line_items[0][price_data][currency]", "usd".to_string()),
            ("line_items[0][price_data][product_data][name]", pack.name.clone()),
            (
                "line_items[0][price_data][product_data][description]",
                format!("{} CR AudioViz AI credits", pack.credits),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                pack.price_cents.to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[user_id]", user),
            ("metadata[pack]", pack.id.clone()),
            ("metadata[credits]", pack.credits.to_string()),
        ];

        if let Some(cid) = customer_id {
            params.push(("customer", cid.to_string()));
        }

        tracing::debug!(
            user_id = %user_id,
            pack = %pack.id,
            amount_cents = pack.price_cents,
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        handle_response(response).await
    }
}

/// Verify a `Stripe-Signature` header and parse the event.
///
/// The header looks like `t=1700000000,v1=<hex>,v1=<hex>`. The event is
/// accepted when any `v1` equals HMAC-SHA256 of `"{t}.{payload}"` and `t`
/// is within [`WEBHOOK_TOLERANCE_SECONDS`] of `now_unix`.
///
/// # Errors
///
/// - `StripeError::InvalidSignature` for a malformed header or no match.
/// - `StripeError::StaleTimestamp` when `t` is too old or in the future.
/// - `StripeError::Serialization` if the payload is not an event.
pub fn verify_webhook(
    secret: &str,
    payload: &str,
    header: &str,
    now_unix: i64,
) -> Result<WebhookEvent, StripeError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(StripeError::InvalidSignature)?;
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidSignature)?;
    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature);
    }

    let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"));
    if !signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        return Err(StripeError::InvalidSignature);
    }

    if (now_unix - signed_at).abs() > WEBHOOK_TOLERANCE_SECONDS {
        return Err(StripeError::StaleTimestamp);
    }

    Ok(serde_json::from_str(payload)?)
}

/// Decode a success body or turn a Stripe error body into `StripeError::Api`.
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StripeError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json().await?);
    }

    match response.json::<StripeErrorResponse>().await {
        Ok(stripe_error) => Err(StripeError::Api {
            error_type: stripe_error.error.error_type,
            message: stripe_error.error.message,
            code: stripe_error.error.code,
        }),
        Err(_) => Err(StripeError::Api {
            error_type: "unknown".to_string(),
            message: format!("HTTP {status}"),
            code: None,
        }),
    }
}
