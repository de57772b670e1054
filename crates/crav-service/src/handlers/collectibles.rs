//! Collectibles: cards, vinyl and comics.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crav_core::catalog::require_text;
use crav_core::{Collectible, CollectibleId, CollectibleKind, UserId};
use crav_store::CollectibleQuery;

use super::{default_limit, MAX_PAGE_SIZE};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

const MAX_TITLE_LEN: usize = 200;
const MAX_SEARCH_LEN: usize = 100;

/// Collectible list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// `card`, `vinyl` or `comic`.
    #[serde(default)]
    pub kind: Option<CollectibleKind>,
    /// Only this owner's items.
    #[serde(default)]
    pub owner_id: Option<UserId>,
    /// Text search over title and artist/publisher.
    #[serde(default, rename = "q")]
    pub search: Option<String>,
    /// Page size (default: 50, max 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination.
    #[serde(default)]
    pub offset: usize,
}

/// List collectibles, newest first.
pub async fn list_collectibles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Collectible>>, ApiError> {
    let search = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if search.as_ref().is_some_and(|s| s.chars().count() > MAX_SEARCH_LEN) {
        return Err(ApiError::BadRequest(format!(
            "search must be at most {MAX_SEARCH_LEN} characters"
        )));
    }

    let items = state
        .store
        .list_collectibles(&CollectibleQuery {
            kind: query.kind,
            owner_id: query.owner_id,
            search,
            limit: query.limit.clamp(1, MAX_PAGE_SIZE),
            offset: query.offset,
        })
        .await?;

    Ok(Json(items))
}

/// Add-collectible request.
#[derive(Debug, Deserialize)]
pub struct AddCollectibleRequest {
    /// Category.
    pub kind: CollectibleKind,
    /// Title.
    pub title: String,
    /// Artist, band or publisher.
    #[serde(default)]
    pub artist_or_publisher: Option<String>,
    /// Release year.
    #[serde(default)]
    pub year: Option<i32>,
    /// Free-text grade.
    #[serde(default)]
    pub condition: Option<String>,
    /// Owner's estimate in US cents.
    #[serde(default)]
    pub estimated_value_cents: Option<i64>,
}

/// Add an item to the caller's collection.
pub async fn add_collectible(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<AddCollectibleRequest>,
) -> Result<(StatusCode, Json<Collectible>), ApiError> {
    require_text("title", &body.title, MAX_TITLE_LEN)?;
    if body.year.is_some_and(|y| !(1800..=2100).contains(&y)) {
        return Err(ApiError::BadRequest("year out of range".into()));
    }
    if body.estimated_value_cents.is_some_and(|v| v < 0) {
        return Err(ApiError::BadRequest(
            "estimated_value_cents must not be negative".into(),
        ));
    }

    let item = Collectible {
        id: CollectibleId::generate(),
        owner_id: auth.user_id,
        kind: body.kind,
        title: body.title.trim().to_string(),
        artist_or_publisher: body.artist_or_publisher.filter(|s| !s.trim().is_empty()),
        year: body.year,
        condition: body.condition.filter(|s| !s.trim().is_empty()),
        estimated_value_cents: body.estimated_value_cents,
        created_at: Utc::now(),
    };
    state.store.add_collectible(&item).await?;

    tracing::info!(
        collectible_id = %item.id,
        owner_id = %auth.user_id,
        kind = item.kind.as_str(),
        "Collectible added"
    );

    Ok((StatusCode::CREATED, Json(item)))
}

/// Delete one of the caller's items. Other users' items answer 404.
pub async fn delete_collectible(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: CollectibleId = id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid collectible id".into()))?;

    if state.store.delete_collectible(&id, &auth.user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Collectible not found".into()))
    }
}
