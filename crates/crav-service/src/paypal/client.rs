//! PayPal REST client with a cached OAuth2 token.

use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::Mutex;

use crav_core::{CreditPack, UserId};

use super::types::{
    AccessToken, ApplicationContext, CreateOrderRequest, Money, Order, PayPalErrorResponse,
    PurchaseUnitRequest,
};

/// Refresh the token this long before PayPal says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Error type for PayPal operations.
#[derive(Debug, thiserror::Error)]
pub enum PayPalError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// PayPal returned an error.
    #[error("PayPal API error ({status}): {name} - {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Error name.
        name: String,
        /// Error message.
        message: String,
    },
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// PayPal Orders v2 client.
pub struct PayPalClient {
    client: Client,
    client_id: String,
    client_secret: String,
    base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for PayPalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PayPalClient {
    /// Create a client for `base_url` (sandbox or live).
    ///
    /// # Errors
    ///
    /// `PayPalError::Http` if the HTTP client cannot be built.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, PayPalError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    /// A valid access token, fetching a new one when the cached token is
    /// missing or about to expire.
    async fn access_token(&self) -> Result<String, PayPalError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let token: AccessToken = handle_response(response).await?;

        tracing::debug!(expires_in = token.expires_in, "Fetched PayPal access token");
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }

    /// Create an order for one credit pack.
    ///
    /// # Errors
    ///
    /// `PayPalError::Api` if PayPal rejects the token or the order.
    pub async fn create_order(
        &self,
        user_id: &UserId,
        pack: &CreditPack,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<Order, PayPalError> {
        let token = self.access_token().await?;
        let body = CreateOrderRequest {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnitRequest {
                reference_id: pack.id.clone(),
                custom_id: user_id.to_string(),
                description: format!("{} ({} credits)", pack.name, pack.credits),
                amount: Money::usd_from_cents(pack.price_cents),
            }],
            application_context: ApplicationContext {
                brand_name: "CR AudioViz AI".to_string(),
                return_url: return_url.to_string(),
                cancel_url: cancel_url.to_string(),
                shipping_preference: "NO_SHIPPING",
            },
        };

        tracing::debug!(user_id = %user_id, pack = %pack.id, "Creating PayPal order");

        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        handle_response(response).await
    }

    /// Fetch an order as PayPal currently sees it.
    ///
    /// # Errors
    ///
    /// `PayPalError::Api` if the order is unknown.
    pub async fn get_order(&self, order_id: &str) -> Result<Order, PayPalError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(format!("{}/v2/checkout/orders/{order_id}", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        handle_response(response).await
    }

    /// Capture an approved order.
    ///
    /// # Errors
    ///
    /// `PayPalError::Api` if the order is unknown, not approved or already
    /// captured.
    pub async fn capture_order(&self, order_id: &str) -> Result<Order, PayPalError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{order_id}/capture",
                self.base_url
            ))
            .bearer_auth(token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        handle_response(response).await
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PayPalError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.json::<PayPalErrorResponse>().await.ok();
    Err(PayPalError::Api {
        status: status.as_u16(),
        name: body
            .as_ref()
            .map_or_else(|| "UNKNOWN".to_string(), |b| b.name.clone()),
        message: body.map_or_else(|| format!("HTTP {status}"), |b| b.message),
    })
}
