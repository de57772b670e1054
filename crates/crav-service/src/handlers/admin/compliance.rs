//! Configuration compliance checks.
//!
//! Each rule inspects [`ServiceConfig`] and reports `pass`, `warn` or
//! `fail`. Nothing here touches the network.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::AdminAuth;
use crate::config::{PayPalMode, ServiceConfig};
use crate::state::AppState;

/// Shortest acceptable HS256 secret, in bytes.
pub const MIN_JWT_SECRET_BYTES: usize = 32;

/// Rule outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Compliant.
    Pass,
    /// Acceptable outside production, or advisory.
    Warn,
    /// Must be fixed.
    Fail,
}

/// One evaluated rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    /// Rule id.
    pub rule: &'static str,
    /// Outcome.
    pub outcome: Outcome,
    /// Explanation.
    pub message: String,
}

/// Totals per outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Passing rules.
    pub pass: usize,
    /// Warnings.
    pub warn: usize,
    /// Failures.
    pub fail: usize,
}

/// Compliance response.
#[derive(Debug, Serialize)]
pub struct ComplianceResponse {
    /// Worst outcome.
    pub overall: Outcome,
    /// Counts.
    pub summary: Summary,
    /// Every rule.
    pub results: Vec<RuleResult>,
}

fn result(rule: &'static str, outcome: Outcome, message: impl Into<String>) -> RuleResult {
    RuleResult {
        rule,
        outcome,
        message: message.into(),
    }
}

fn is_set(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn required_secret(rule: &'static str, env: &str, value: Option<&String>) -> RuleResult {
    if is_set(value) {
        result(rule, Outcome::Pass, format!("{env} is set"))
    } else {
        result(rule, Outcome::Fail, format!("{env} is not set"))
    }
}

/// Evaluate every rule against `config`.
#[must_use]
pub fn evaluate(config: &ServiceConfig) -> Vec<RuleResult> {
    let production = config.is_production();
    let mut results = vec![
        required_secret("admin_secret", "ADMIN_SECRET", config.admin_secret.as_ref()),
        required_secret("cron_secret", "CRON_SECRET", config.cron_secret.as_ref()),
    ];

    results.push(match config.supabase_jwt_secret.as_deref() {
        None | Some("") => result("jwt_secret", Outcome::Fail, "SUPABASE_JWT_SECRET is not set"),
        Some(secret) if secret.len() < MIN_JWT_SECRET_BYTES => result(
            "jwt_secret",
            Outcome::Fail,
            format!(
                "SUPABASE_JWT_SECRET is {} bytes, need at least {MIN_JWT_SECRET_BYTES}",
                secret.len()
            ),
        ),
        Some(_) => result("jwt_secret", Outcome::Pass, "SUPABASE_JWT_SECRET is strong enough"),
    });

    results.push(if !is_set(config.stripe_secret_key.as_ref()) {
        result("stripe_webhook_secret", Outcome::Pass, "Stripe disabled")
    } else if is_set(config.stripe_webhook_secret.as_ref()) {
        result("stripe_webhook_secret", Outcome::Pass, "STRIPE_WEBHOOK_SECRET is set")
    } else {
        result(
            "stripe_webhook_secret",
            Outcome::Fail,
            "Stripe is enabled but STRIPE_WEBHOOK_SECRET is not set",
        )
    });

    let wildcard = config.cors_origins.iter().any(|o| o == "*");
    results.push(match (wildcard, production) {
        (false, _) => result("cors_origins", Outcome::Pass, "CORS origins are explicit"),
        (true, true) => result(
            "cors_origins",
            Outcome::Fail,
            "CORS_ORIGINS is '*' in production",
        ),
        (true, false) => result(
            "cors_origins",
            Outcome::Warn,
            "CORS_ORIGINS is '*'; set explicit origins before going live",
        ),
    });

    results.push(
        if config.paypal_mode == PayPalMode::Live && !production {
            result(
                "paypal_mode",
                Outcome::Fail,
                format!("PAYPAL_MODE is live while APP_ENV is {}", config.app_env),
            )
        } else {
            result(
                "paypal_mode",
                Outcome::Pass,
                format!("PAYPAL_MODE is {}", config.paypal_mode.as_str()),
            )
        },
    );

    results.push(if config.database_url.is_some() {
        result("database", Outcome::Pass, "DATABASE_URL is set")
    } else if production {
        result("database", Outcome::Fail, "no DATABASE_URL in production")
    } else {
        result("database", Outcome::Warn, "running on the in-memory store")
    });

    results.push(if is_set(config.internal_api_secret.as_ref()) {
        result("internal_api_secret", Outcome::Pass, "INTERNAL_API_SECRET is set")
    } else {
        result(
            "internal_api_secret",
            Outcome::Warn,
            "INTERNAL_API_SECRET is not set; internal spend is disabled",
        )
    });

    results
}

/// Count outcomes.
#[must_use]
pub fn summarize(results: &[RuleResult]) -> Summary {
    results.iter().fold(Summary::default(), |mut s, r| {
        match r.outcome {
            Outcome::Pass => s.pass += 1,
            Outcome::Warn => s.warn += 1,
            Outcome::Fail => s.fail += 1,
        }
        s
    })
}

/// Run the compliance rules.
pub async fn run_checks(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
) -> Json<ComplianceResponse> {
    let results = evaluate(&state.config);
    let summary = summarize(&results);
    let overall = results
        .iter()
        .map(|r| r.outcome)
        .max()
        .unwrap_or(Outcome::Pass);

    tracing::info!(
        admin_id = %admin.admin_id,
        pass = summary.pass,
        warn = summary.warn,
        fail = summary.fail,
        "Compliance checks run"
    );

    Json(ComplianceResponse {
        overall,
        summary,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(results: &[RuleResult], rule: &str) -> Outcome {
        results
            .iter()
            .find(|r| r.rule == rule)
            .map(|r| r.outcome)
            .unwrap()
    }

    fn hardened() -> ServiceConfig {
        ServiceConfig {
            app_env: "production".into(),
            database_url: Some("postgres://db/crav".into()),
            supabase_jwt_secret: Some("x".repeat(48)),
            admin_secret: Some("admin".into()),
            cron_secret: Some("cron".into()),
            internal_api_secret: Some("internal".into()),
            stripe_secret_key: Some("sk_live_1".into()),
            stripe_webhook_secret: Some("whsec_1".into()),
            cors_origins: vec!["https://craudiovizai.com".into()],
            paypal_mode: PayPalMode::Live,
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn hardened_production_config_passes() {
        let results = evaluate(&hardened());
        let summary = summarize(&results);
        assert_eq!(summary.fail, 0);
        assert_eq!(summary.warn, 0);
    }

    #[test]
    fn default_config_fails_on_missing_secrets() {
        let results = evaluate(&ServiceConfig::default());
        assert_eq!(outcome(&results, "admin_secret"), Outcome::Fail);
        assert_eq!(outcome(&results, "jwt_secret"), Outcome::Fail);
        assert_eq!(outcome(&results, "cors_origins"), Outcome::Warn);
        assert_eq!(outcome(&results, "stripe_webhook_secret"), Outcome::Pass);
    }

    #[test]
    fn short_jwt_secret_fails() {
        let config = ServiceConfig {
            supabase_jwt_secret: Some("short".into()),
            ..hardened()
        };
        assert_eq!(outcome(&evaluate(&config), "jwt_secret"), Outcome::Fail);
    }

    #[test]
    fn wildcard_cors_fails_only_in_production() {
        let mut config = ServiceConfig {
            cors_origins: vec!["*".into()],
            ..hardened()
        };
        assert_eq!(outcome(&evaluate(&config), "cors_origins"), Outcome::Fail);
        config.app_env = "staging".into();
        assert_eq!(outcome(&evaluate(&config), "cors_origins"), Outcome::Warn);
    }

    #[test]
    fn live_paypal_outside_production_fails() {
        let config = ServiceConfig {
            app_env: "development".into(),
            ..hardened()
        };
        assert_eq!(outcome(&evaluate(&config), "paypal_mode"), Outcome::Fail);
    }

    #[test]
    fn stripe_without_webhook_secret_fails() {
        let config = ServiceConfig {
            stripe_webhook_secret: None,
            ..hardened()
        };
        assert_eq!(
            outcome(&evaluate(&config), "stripe_webhook_secret"),
            Outcome::Fail
        );
    }
}
