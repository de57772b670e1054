//! Newsletter subscribe and unsubscribe.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crav_core::catalog::require_text;
use crav_core::newsletter::normalize_email;

use crate::error::ApiError;
use crate::state::AppState;

/// Longest accepted signup source tag.
const MAX_SOURCE_LEN: usize = 50;

/// Subscribe request.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Email address.
    pub email: String,
    /// Where the form was (default: `website`).
    #[serde(default)]
    pub source: Option<String>,
}

/// Subscribe response.
#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    /// Normalised address.
    pub email: String,
    /// Always `true` after a successful call.
    pub subscribed: bool,
}

/// Subscribe an address. Subscribing twice is a no-op.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let email = normalize_email(&body.email)?;
    let source = body.source.as_deref().unwrap_or("website").trim();
    require_text("source", source, MAX_SOURCE_LEN)?;

    let subscriber = state.store.subscribe(&email, source).await?;
    let subscribed = subscriber.is_active();
    tracing::info!(source, "Newsletter subscription");

    Ok(Json(SubscribeResponse {
        email: subscriber.email,
        subscribed,
    }))
}

/// Unsubscribe request.
#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    /// Email address.
    pub email: String,
}

/// Unsubscribe response.
#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    /// Whether the address was on the list.
    pub found: bool,
}

/// Unsubscribe an address.
///
/// Unknown addresses answer `found: false` rather than 404 so the endpoint
/// does not reveal who is subscribed.
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UnsubscribeRequest>,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    let email = normalize_email(&body.email)?;
    let found = state.store.unsubscribe(&email).await?;
    Ok(Json(UnsubscribeResponse { found }))
}
