//! System health for the admin dashboard.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::AdminAuth;
use crate::state::AppState;

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Working.
    Ok,
    /// Usable but not fully configured or stale.
    Warn,
    /// Broken.
    Error,
}

/// Overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// All checks ok.
    Healthy,
    /// At least one warning, no errors.
    Degraded,
    /// At least one error.
    Unhealthy,
}

/// One health check result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Check name.
    pub name: &'static str,
    /// Result.
    pub status: CheckStatus,
    /// Time spent, in milliseconds.
    pub latency_ms: u64,
    /// Detail for operators.
    pub message: String,
}

/// Admin health response.
#[derive(Debug, Serialize)]
pub struct SystemHealthResponse {
    /// Overall verdict.
    pub status: OverallStatus,
    /// Individual checks.
    pub checks: Vec<HealthCheck>,
    /// Seconds since start.
    pub uptime_seconds: u64,
    /// Service version.
    pub version: &'static str,
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

async fn check_database(state: &AppState) -> HealthCheck {
    let started = Instant::now();
    let (status, message) = match state.store.ping().await {
        Ok(()) => (CheckStatus::Ok, "reachable".to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            (CheckStatus::Error, e.to_string())
        }
    };
    HealthCheck {
        name: "database",
        status,
        latency_ms: elapsed_ms(started),
        message,
    }
}

async fn check_configured(name: &'static str, configured: bool) -> HealthCheck {
    let started = Instant::now();
    let (status, message) = if configured {
        (CheckStatus::Ok, "configured".to_string())
    } else {
        (CheckStatus::Warn, "not configured".to_string())
    };
    HealthCheck {
        name,
        status,
        latency_ms: elapsed_ms(started),
        message,
    }
}

async fn check_flag_cache(state: &AppState) -> HealthCheck {
    let started = Instant::now();
    let ttl = state.flags.ttl();
    // A stale snapshot is reloaded on the next read, so age alone is not a fault.
    let message = match state.flags.age().await {
        None => "not loaded yet".to_string(),
        Some(age) => format!("age {}s, ttl {}s", age.as_secs(), ttl.as_secs()),
    };
    HealthCheck {
        name: "feature_flags",
        status: CheckStatus::Ok,
        latency_ms: elapsed_ms(started),
        message,
    }
}

/// Fold check results into a verdict.
#[must_use]
pub fn overall(checks: &[HealthCheck]) -> OverallStatus {
    if checks.iter().any(|c| c.status == CheckStatus::Error) {
        OverallStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == CheckStatus::Warn) {
        OverallStatus::Degraded
    } else {
        OverallStatus::Healthy
    }
}

/// Run all checks concurrently.
pub async fn system_health(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
) -> Json<SystemHealthResponse> {
    let (database, stripe, paypal, flags) = futures::join!(
        check_database(&state),
        check_configured("stripe", state.has_stripe()),
        check_configured("paypal", state.has_paypal()),
        check_flag_cache(&state),
    );

    let checks = vec![database, stripe, paypal, flags];
    Json(SystemHealthResponse {
        status: overall(&checks),
        checks,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(status: CheckStatus) -> HealthCheck {
        HealthCheck {
            name: "x",
            status,
            latency_ms: 0,
            message: String::new(),
        }
    }

    #[test]
    fn worst_check_decides() {
        assert_eq!(overall(&[check(CheckStatus::Ok)]), OverallStatus::Healthy);
        assert_eq!(
            overall(&[check(CheckStatus::Ok), check(CheckStatus::Warn)]),
            OverallStatus::Degraded
        );
        assert_eq!(
            overall(&[check(CheckStatus::Warn), check(CheckStatus::Error)]),
            OverallStatus::Unhealthy
        );
    }
}
