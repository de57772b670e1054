//! Public feature flag check.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crav_core::flags::validate_key;

use crate::auth::OptionalUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Flag check response.
#[derive(Debug, Serialize)]
pub struct FlagResponse {
    /// Flag key.
    pub key: String,
    /// Whether the flag is on for the caller.
    pub enabled: bool,
}

/// Whether a flag is on for the caller. Unknown flags are off.
pub async fn get_flag(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<FlagResponse>, ApiError> {
    validate_key(&key)?;

    let user_id = user.as_ref().map(|u| &u.user_id);
    let enabled = state
        .flags
        .is_enabled(state.store.as_ref(), &key, user_id)
        .await?;

    Ok(Json(FlagResponse { key, enabled }))
}
