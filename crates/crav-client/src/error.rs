//! Client error types.

use std::fmt;

use crate::types::RefundReceipt;

/// Errors returned by [`CreditsClient`](crate::CreditsClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Token missing, expired or rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// Insufficient credits.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// The spend was already refunded.
    #[error("already refunded: {message}")]
    AlreadyRefunded {
        /// Server message.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Whether the caller should be sent to the Pricing page.
    #[must_use]
    pub const fn is_insufficient_credits(&self) -> bool {
        matches!(self, Self::InsufficientCredits { .. })
    }
}

/// Failure from [`CreditsClient::with_credits`](crate::CreditsClient::with_credits).
#[derive(Debug)]
pub enum WithCreditsError<E> {
    /// The spend was refused; the operation never ran.
    Spend(ClientError),
    /// The operation failed after the spend.
    Operation {
        /// The operation's error.
        error: E,
        /// The refund, or `None` if refunding failed too.
        refund: Option<RefundReceipt>,
    },
}

impl<E> WithCreditsError<E> {
    /// The operation's error, if the operation ran.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Spend(_) => None,
            Self::Operation { error, .. } => Some(error),
        }
    }
}

impl<E: fmt::Display> fmt::Display for WithCreditsError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spend(e) => write!(f, "spend failed: {e}"),
            Self::Operation {
                error,
                refund: Some(_),
            } => write!(f, "operation failed (credits refunded): {error}"),
            Self::Operation { error, refund: None } => {
                write!(f, "operation failed (refund failed): {error}")
            }
        }
    }
}

impl<E> std::error::Error for WithCreditsError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spend(e) => Some(e),
            Self::Operation { error, .. } => Some(error),
        }
    }
}
