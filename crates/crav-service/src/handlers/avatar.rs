//! Avatar glow and active-avatar handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crav_core::{glow_for, AvatarState, GlowParams};

use crate::auth::AuthUser;
use crate::avatar::ActiveAvatar;
use crate::error::ApiError;
use crate::state::AppState;

/// Longest accepted avatar id.
const MAX_AVATAR_ID_LEN: usize = 64;

/// One row of the glow table.
#[derive(Debug, Serialize)]
pub struct GlowEntry {
    /// State.
    pub state: AvatarState,
    /// Raw parameters.
    pub glow: GlowParams,
    /// CSS `box-shadow` value.
    pub box_shadow: String,
    /// CSS `animation` value.
    pub animation: String,
}

/// Glow parameters for every avatar state.
pub async fn glow_table() -> Json<Vec<GlowEntry>> {
    Json(
        AvatarState::ALL
            .iter()
            .map(|&state| {
                let glow = glow_for(state);
                GlowEntry {
                    state,
                    box_shadow: glow.css_box_shadow(),
                    animation: glow.css_animation(),
                    glow,
                }
            })
            .collect(),
    )
}

/// Active avatar response.
#[derive(Debug, Serialize)]
pub struct ActiveResponse {
    /// The active avatar, if any.
    pub active: Option<ActiveAvatar>,
}

/// Current active avatar.
pub async fn get_active(State(state): State<Arc<AppState>>) -> Json<ActiveResponse> {
    Json(ActiveResponse {
        active: state.avatar.current(),
    })
}

/// Set-active request. Omitting `avatar_id` changes only the state.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    /// Avatar to activate.
    #[serde(default)]
    pub avatar_id: Option<String>,
    /// New state (default: idle).
    #[serde(default)]
    pub state: AvatarState,
}

/// Activate an avatar or change the active avatar's state.
pub async fn set_active(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<ActiveAvatar>, ApiError> {
    let active = match body.avatar_id.as_deref().map(str::trim) {
        Some(id) => {
            if id.is_empty() || id.len() > MAX_AVATAR_ID_LEN {
                return Err(ApiError::BadRequest(format!(
                    "avatar_id must be 1-{MAX_AVATAR_ID_LEN} characters"
                )));
            }
            state.avatar.set_active(id, body.state)
        }
        None => state
            .avatar
            .set_state(body.state)
            .ok_or_else(|| ApiError::NotFound("No active avatar".into()))?,
    };

    tracing::debug!(
        user_id = %auth.user_id,
        avatar_id = %active.avatar_id,
        state = active.state.as_str(),
        "Active avatar changed"
    );

    Ok(Json(active))
}

/// Deactivate the avatar.
pub async fn clear_active(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    if state.avatar.clear() {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("No active avatar".into()))
    }
}
