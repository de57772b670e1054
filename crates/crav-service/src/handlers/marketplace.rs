//! Marketplace directory listings.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crav_core::{Category, Vendor};

use crate::error::ApiError;
use crate::state::AppState;

/// Marketplace categories in display order.
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.store.list_categories().await?))
}

/// Vendor list query parameters.
#[derive(Debug, Deserialize)]
pub struct VendorQuery {
    /// Only vendors in this category.
    #[serde(default)]
    pub category: Option<String>,
}

/// Vendors, optionally filtered by category.
pub async fn list_vendors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VendorQuery>,
) -> Result<Json<Vec<Vendor>>, ApiError> {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    Ok(Json(state.store.list_vendors(category).await?))
}
