//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use crav_core::PricingConfig;

/// PayPal environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayPalMode {
    /// Sandbox accounts and fake money.
    #[default]
    Sandbox,
    /// Real payments.
    Live,
}

impl PayPalMode {
    /// REST API base URL for this mode.
    #[must_use]
    pub const fn api_base(self) -> &'static str {
        match self {
            Self::Sandbox => "https://api-m.sandbox.paypal.com",
            Self::Live => "https://api-m.paypal.com",
        }
    }

    /// Parse `PAYPAL_MODE`; anything other than `live` is sandbox.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("live") {
            Self::Live
        } else {
            Self::Sandbox
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Live => "live",
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Deployment environment (default: "development").
    pub app_env: String,

    /// Name used in cron lock holder ids (default: `$HOSTNAME` or "crav").
    pub instance_name: String,

    /// PostgreSQL URL. Without it the service runs on the in-memory store.
    pub database_url: Option<String>,

    /// Pool size for `database_url`.
    pub database_max_connections: u32,

    /// Supabase project URL (informational).
    pub supabase_url: Option<String>,

    /// HS256 secret that signs Supabase access tokens.
    pub supabase_jwt_secret: Option<String>,

    /// Stripe secret key.
    pub stripe_secret_key: Option<String>,

    /// Stripe webhook signing secret.
    pub stripe_webhook_secret: Option<String>,

    /// Stripe API base URL.
    pub stripe_api_base: String,

    /// PayPal REST client id.
    pub paypal_client_id: Option<String>,

    /// PayPal REST client secret.
    pub paypal_client_secret: Option<String>,

    /// PayPal environment.
    pub paypal_mode: PayPalMode,

    /// Override for the PayPal API base URL.
    pub paypal_api_base: Option<String>,

    /// Shared secret for `/api/admin/*` (`x-admin-secret`).
    pub admin_secret: Option<String>,

    /// Bearer secret for `/api/cron/*`.
    pub cron_secret: Option<String>,

    /// Shared secret for `/api/internal/*` (`x-internal-secret`).
    pub internal_api_secret: Option<String>,

    /// Public site URL for checkout redirects.
    pub site_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Feature flag cache lifetime in seconds.
    pub feature_flag_ttl_seconds: u64,

    /// Cron lock lease length in seconds.
    pub cron_lock_ttl_seconds: u64,

    /// Feature prices and credit packs.
    pub pricing: PricingConfig,
}

/// `.secrets/stripe.json`
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    secret_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

/// `.secrets/paypal.json`
#[derive(Debug, Deserialize)]
struct PayPalSecrets {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    mode: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let (stripe_secret_key, stripe_webhook_secret) = load_stripe_secrets();
        let (paypal_client_id, paypal_client_secret, paypal_mode) = load_paypal_secrets();
        let defaults = Self::default();

        Self {
            listen_addr: env_or("LISTEN_ADDR", &defaults.listen_addr),
            app_env: env_or("APP_ENV", &defaults.app_env),
            instance_name: env_opt("HOSTNAME").unwrap_or(defaults.instance_name),
            database_url: env_opt("DATABASE_URL"),
            database_max_connections: env_parse(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            supabase_url: env_opt("SUPABASE_URL"),
            supabase_jwt_secret: env_opt("SUPABASE_JWT_SECRET"),
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_api_base: env_or("STRIPE_API_BASE", &defaults.stripe_api_base),
            paypal_client_id,
            paypal_client_secret,
            paypal_mode,
            paypal_api_base: env_opt("PAYPAL_API_BASE"),
            admin_secret: env_opt("ADMIN_SECRET"),
            cron_secret: env_opt("CRON_SECRET"),
            internal_api_secret: env_opt("INTERNAL_API_SECRET"),
            site_url: env_or("SITE_URL", &defaults.site_url),
            cors_origins: parse_origins(&env_or("CORS_ORIGINS", "*")),
            max_body_bytes: env_parse("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: env_parse(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
            feature_flag_ttl_seconds: env_parse(
                "FEATURE_FLAG_TTL_SECONDS",
                defaults.feature_flag_ttl_seconds,
            ),
            cron_lock_ttl_seconds: env_parse(
                "CRON_LOCK_TTL_SECONDS",
                defaults.cron_lock_ttl_seconds,
            ),
            pricing: PricingConfig::default(),
        }
    }

    /// Whether `APP_ENV` is `production`.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    /// PayPal API base URL, honouring the override.
    #[must_use]
    pub fn paypal_base_url(&self) -> &str {
        self.paypal_api_base
            .as_deref()
            .unwrap_or_else(|| self.paypal_mode.api_base())
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// Split a comma-separated origin list.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

const SECRET_DIRS: [&str; 3] = [".secrets", "crates/crav-service/.secrets", "../.secrets"];

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    for dir in SECRET_DIRS {
        let path = format!("{dir}/stripe.json");
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(&path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (Some(secrets.secret_key), secrets.webhook_secret);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        env_opt("STRIPE_SECRET_KEY"),
        env_opt("STRIPE_WEBHOOK_SECRET"),
    )
}

/// Load PayPal secrets from file or environment.
fn load_paypal_secrets() -> (Option<String>, Option<String>, PayPalMode) {
    for dir in SECRET_DIRS {
        let path = format!("{dir}/paypal.json");
        if let Ok(secrets) = load_secrets_file::<PayPalSecrets>(&path) {
            tracing::info!(path = %path, "Loaded PayPal secrets from file");
            let mode = secrets
                .mode
                .or_else(|| env_opt("PAYPAL_MODE"))
                .map(|m| PayPalMode::parse(&m))
                .unwrap_or_default();
            return (Some(secrets.client_id), Some(secrets.client_secret), mode);
        }
    }

    tracing::debug!("PayPal secrets file not found, using environment variables");
    (
        env_opt("PAYPAL_CLIENT_ID"),
        env_opt("PAYPAL_CLIENT_SECRET"),
        env_opt("PAYPAL_MODE")
            .map(|m| PayPalMode::parse(&m))
            .unwrap_or_default(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            app_env: "development".into(),
            instance_name: "crav".into(),
            database_url: None,
            database_max_connections: 10,
            supabase_url: None,
            supabase_jwt_secret: None,
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: "https://api.stripe.com/v1".into(),
            paypal_client_id: None,
            paypal_client_secret: None,
            paypal_mode: PayPalMode::Sandbox,
            paypal_api_base: None,
            admin_secret: None,
            cron_secret: None,
            internal_api_secret: None,
            site_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            feature_flag_ttl_seconds: 60,
            cron_lock_ttl_seconds: 600,
            pricing: PricingConfig::default(),
        }
    }
}
