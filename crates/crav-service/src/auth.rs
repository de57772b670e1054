//! Authentication extractors.
//!
//! - `AuthUser` - Supabase access token (HS256 JWT)
//! - `OptionalUser` - same, but anonymous requests pass through
//! - `AdminAuth` - `x-admin-secret` header
//! - `CronAuth` - `Authorization: Bearer <CRON_SECRET>`
//! - `InternalAuth` - `x-internal-secret` header

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crav_core::UserId;

use crate::crypto::secret_matches;
use crate::error::ApiError;
use crate::state::AppState;

/// Audience Supabase puts on signed-in user tokens.
pub const SUPABASE_AUDIENCE: &str = "authenticated";

/// An authenticated user extracted from a Supabase JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
    /// Email claim, when present.
    pub email: Option<String>,
}

/// Claims read from a Supabase access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user UUID).
    pub sub: String,
    /// Audience.
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    /// Expiration time.
    pub exp: i64,
    /// Email.
    #[serde(default)]
    pub email: Option<String>,
    /// Supabase role (`authenticated`, `anon`, `service_role`).
    #[serde(default)]
    pub role: Option<String>,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        let claims = validate_jwt(token, state)?;

        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(Self {
            user_id,
            email: claims.email,
        })
    }
}

/// A user if the request carries a valid token, otherwise anonymous.
///
/// A present but invalid token is still rejected.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<AuthUser>);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for OptionalUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key("authorization") {
            return Ok(Self(None));
        }
        AuthUser::from_request_parts(parts, state)
            .await
            .map(|user| Self(Some(user)))
    }
}

/// Admin authentication via shared secret.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let presented = header_str(parts, "x-admin-secret");
        if !secret_matches(presented, state.config.admin_secret.as_deref()) {
            return Err(ApiError::Unauthorized);
        }

        let admin_id = header_str(parts, "x-admin-id")
            .unwrap_or("admin")
            .to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(Self { admin_id })
    }
}

/// Scheduler authentication via `CRON_SECRET`.
#[derive(Debug, Clone, Copy)]
pub struct CronAuth;

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CronAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if secret_matches(bearer_token(parts), state.config.cron_secret.as_deref()) {
            Ok(Self)
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Service-to-service authentication via `INTERNAL_API_SECRET`.
#[derive(Debug, Clone)]
pub struct InternalAuth {
    /// Calling service, from `x-service-name`.
    pub service_name: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for InternalAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let presented = header_str(parts, "x-internal-secret");
        if !secret_matches(presented, state.config.internal_api_secret.as_deref()) {
            return Err(ApiError::Unauthorized);
        }

        let service_name = header_str(parts, "x-service-name")
            .unwrap_or("unknown")
            .to_string();

        Ok(Self { service_name })
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    header_str(parts, "authorization")?.strip_prefix("Bearer ")
}

/// Validate an HS256 Supabase token.
fn validate_jwt(token: &str, state: &AppState) -> Result<JwtClaims, ApiError> {
    let Some(secret) = state
        .config
        .supabase_jwt_secret
        .as_deref()
        .filter(|s| !s.is_empty())
    else {
        tracing::warn!("SUPABASE_JWT_SECRET not set - rejecting user token");
        return Err(ApiError::Unauthorized);
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[SUPABASE_AUDIENCE]);

    let token_data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })?;

    Ok(token_data.claims)
}
