//! Application state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crav_store::Store;

use crate::avatar::AvatarHub;
use crate::config::ServiceConfig;
use crate::flags::FlagCache;
use crate::paypal::PayPalClient;
use crate::stripe::StripeClient;

/// Application state shared across handlers.
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Feature flag cache.
    pub flags: FlagCache,

    /// Active chat-widget avatar.
    pub avatar: AvatarHub,

    /// Stripe client for checkout (optional).
    pub stripe: Option<Arc<StripeClient>>,

    /// PayPal client for orders (optional).
    pub paypal: Option<Arc<PayPalClient>>,

    started_at: Instant,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let stripe = config.stripe_secret_key.as_ref().and_then(|key| {
            match StripeClient::new(key, &config.stripe_api_base) {
                Ok(client) => {
                    tracing::info!("Stripe integration enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if stripe.is_none() {
            tracing::warn!("Stripe not configured - card checkout will not be available");
        }

        let paypal = config
            .paypal_client_id
            .as_ref()
            .zip(config.paypal_client_secret.as_ref())
            .and_then(|(id, secret)| {
                match PayPalClient::new(id, secret, config.paypal_base_url()) {
                    Ok(client) => {
                        tracing::info!(mode = config.paypal_mode.as_str(), "PayPal integration enabled");
                        Some(Arc::new(client))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create PayPal client");
                        None
                    }
                }
            });

        if paypal.is_none() {
            tracing::warn!("PayPal not configured - PayPal checkout will not be available");
        }

        let flags = FlagCache::new(Duration::from_secs(config.feature_flag_ttl_seconds));

        Self {
            store,
            config,
            flags,
            avatar: AvatarHub::new(),
            stripe,
            paypal,
            started_at: Instant::now(),
        }
    }

    /// Check if Stripe is configured.
    #[must_use]
    pub fn has_stripe(&self) -> bool {
        self.stripe.is_some()
    }

    /// Check if PayPal is configured.
    #[must_use]
    pub fn has_paypal(&self) -> bool {
        self.paypal.is_some()
    }

    /// Seconds since the state was built.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
