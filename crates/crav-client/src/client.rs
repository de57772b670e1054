//! Credits API client implementation.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use crate::error::{ClientError, WithCreditsError};
use crate::types::{
    ApiErrorResponse, Balance, InternalSpendRequest, Pricing, RefundReceipt, RefundRequest,
    SpendReceipt, SpendRequest, TransactionPage,
};

/// Reason recorded on refunds issued by [`CreditsClient::with_credits`].
pub const AUTO_REFUND_REASON: &str = "operation failed";

/// Credits API client.
///
/// User calls take the caller's Supabase access token. Service calls
/// (`spend_for_user`) need [`ClientOptions::internal_secret`].
#[derive(Debug, Clone)]
pub struct CreditsClient {
    client: Client,
    base_url: String,
    service_name: String,
    internal_secret: Option<String>,
}

impl CreditsClient {
    /// Create a client with default options.
    ///
    /// # Errors
    ///
    /// `ClientError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a client with custom options.
    ///
    /// # Errors
    ///
    /// `ClientError::Configuration` for an empty base URL, `ClientError::Http`
    /// if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Configuration("base_url is empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url,
            service_name: options.service_name,
            internal_secret: options.internal_secret,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn user(&self, request: RequestBuilder, user_jwt: &str) -> RequestBuilder {
        request.bearer_auth(user_jwt)
    }

    /// Plans, packs and feature costs.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn pricing(&self) -> Result<Pricing, ClientError> {
        let response = self.client.get(self.url("/api/pricing")).send().await?;
        handle_response(response).await
    }

    /// The caller's balance and plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn balance(&self, user_jwt: &str) -> Result<Balance, ClientError> {
        let request = self.client.get(self.url("/api/credits/balance"));
        let response = self.user(request, user_jwt).send().await?;
        handle_response(response).await
    }

    /// A page of the caller's ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn transactions(
        &self,
        user_jwt: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TransactionPage, ClientError> {
        let request = self
            .client
            .get(self.url("/api/credits/transactions"))
            .query(&[("limit", limit), ("offset", offset)]);
        let response = self.user(request, user_jwt).send().await?;
        handle_response(response).await
    }

    /// Charge the caller for `quantity` uses of `feature`.
    ///
    /// # Errors
    ///
    /// `ClientError::InsufficientCredits` when the balance is too low, or
    /// any other request error.
    pub async fn spend(
        &self,
        user_jwt: &str,
        feature: &str,
        quantity: u32,
    ) -> Result<SpendReceipt, ClientError> {
        let request = self
            .client
            .post(self.url("/api/credits/spend"))
            .json(&SpendRequest { feature, quantity });
        let response = self.user(request, user_jwt).send().await?;
        handle_response(response).await
    }

    /// Refund one of the caller's spends.
    ///
    /// # Errors
    ///
    /// `ClientError::AlreadyRefunded` for a second refund of the same spend,
    /// or any other request error.
    pub async fn refund(
        &self,
        user_jwt: &str,
        transaction_id: &str,
        reason: Option<&str>,
    ) -> Result<RefundReceipt, ClientError> {
        let request = self
            .client
            .post(self.url("/api/credits/refund"))
            .json(&RefundRequest {
                transaction_id,
                reason,
            });
        let response = self.user(request, user_jwt).send().await?;
        handle_response(response).await
    }

    /// Charge a user from a backend service.
    ///
    /// # Errors
    ///
    /// `ClientError::Configuration` without an internal secret, otherwise
    /// as [`spend`](Self::spend).
    pub async fn spend_for_user(
        &self,
        user_id: &str,
        feature: &str,
        quantity: u32,
    ) -> Result<SpendReceipt, ClientError> {
        let secret = self.internal_secret.as_deref().ok_or_else(|| {
            ClientError::Configuration("internal_secret is required for service spends".into())
        })?;

        let response = self
            .client
            .post(self.url("/api/internal/credits/spend"))
            .header("x-internal-secret", secret)
            .header("x-service-name", &self.service_name)
            .json(&InternalSpendRequest {
                user_id,
                feature,
                quantity,
            })
            .send()
            .await?;
        handle_response(response).await
    }

    /// Spend credits, run `operation`, and refund the spend if it fails.
    ///
    /// The operation receives the spend receipt. When it fails, the refund
    /// is attempted once; a failed refund is logged and reported as
    /// `refund: None`.
    ///
    /// # Errors
    ///
    /// `WithCreditsError::Spend` if the spend is refused (the operation does
    /// not run), `WithCreditsError::Operation` if the operation fails.
    pub async fn with_credits<T, E, F, Fut>(
        &self,
        user_jwt: &str,
        feature: &str,
        quantity: u32,
        operation: F,
    ) -> Result<T, WithCreditsError<E>>
    where
        F: FnOnce(SpendReceipt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let receipt = self
            .spend(user_jwt, feature, quantity)
            .await
            .map_err(WithCreditsError::Spend)?;
        let transaction_id = receipt.transaction_id.clone();

        match operation(receipt).await {
            Ok(value) => Ok(value),
            Err(error) => {
                tracing::warn!(
                    feature,
                    transaction_id = %transaction_id,
                    error = %error,
                    "Operation failed, refunding credits"
                );
                let refund = match self
                    .refund(user_jwt, &transaction_id, Some(AUTO_REFUND_REASON))
                    .await
                {
                    Ok(refund) => Some(refund),
                    Err(e) => {
                        tracing::error!(
                            transaction_id = %transaction_id,
                            error = %e,
                            "Automatic refund failed"
                        );
                        None
                    }
                };
                Err(WithCreditsError::Operation { error, refund })
            }
        }
    }
}

/// Decode a success body or map the service's error body to `ClientError`.
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json().await?);
    }

    let Ok(api_error) = response.json::<ApiErrorResponse>().await else {
        return Err(ClientError::Api {
            code: "unknown".to_string(),
            message: format!("HTTP {status}"),
            status: status.as_u16(),
        });
    };

    let detail = |key: &str| {
        api_error
            .error
            .details
            .as_ref()
            .and_then(|d| d.get(key))
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0)
    };

    match api_error.error.code.as_str() {
        "unauthorized" => Err(ClientError::Unauthorized),
        "insufficient_credits" => Err(ClientError::InsufficientCredits {
            balance: detail("balance"),
            required: detail("required"),
        }),
        "conflict" if api_error.error.message.contains("refunded") => {
            Err(ClientError::AlreadyRefunded {
                message: api_error.error.message,
            })
        }
        code => Err(ClientError::Api {
            code: code.to_string(),
            message: api_error.error.message,
            status: status.as_u16(),
        }),
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Sent as `x-service-name` on service calls.
    pub service_name: String,
    /// `INTERNAL_API_SECRET`, needed for [`CreditsClient::spend_for_user`].
    pub internal_secret: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
            internal_secret: None,
        }
    }
}

impl ClientOptions {
    /// Options for a backend service holding the internal secret.
    #[must_use]
    pub fn for_service(name: impl Into<String>, internal_secret: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            internal_secret: Some(internal_secret.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = CreditsClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.url("/api/pricing"), "http://localhost:8080/api/pricing");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(matches!(
            CreditsClient::new("/"),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn service_options() {
        let options = ClientOptions::for_service("studio-worker", "s3cret");
        let client = CreditsClient::with_options("http://localhost:8080", options).unwrap();
        assert_eq!(client.service_name, "studio-worker");
        assert_eq!(client.internal_secret.as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn service_spend_without_secret_is_a_configuration_error() {
        let client = CreditsClient::new("http://localhost:8080").unwrap();
        let err = client
            .spend_for_user("user", "chat_message", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }
}
