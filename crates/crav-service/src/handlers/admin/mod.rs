//! Admin handlers.
//!
//! Every handler here takes [`AdminAuth`], which checks `x-admin-secret`.

pub mod compliance;
pub mod health;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crav_core::catalog::require_text;
use crav_core::{
    CreditTransaction, FeatureFlag, Grant, GrantId, GrantStatus, ModerationReport, ReportId,
    ReportStatus, UserId, Vendor, VendorId,
};
use crav_store::StoreError;

use super::{default_limit, MAX_PAGE_SIZE};
use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Largest single admin credit grant.
pub const MAX_ADMIN_GRANT: i64 = 1_000_000;

// ============================================================================
// Feature flags
// ============================================================================

/// All flags, sorted by key.
pub async fn list_flags(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
) -> Result<Json<Vec<FeatureFlag>>, ApiError> {
    let mut flags = state.store.list_flags().await?;
    flags.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(Json(flags))
}

/// Flag upsert request.
#[derive(Debug, Deserialize)]
pub struct UpsertFlagRequest {
    /// On/off.
    pub enabled: bool,
    /// What the flag gates.
    #[serde(default)]
    pub description: String,
    /// Percentage of signed-in users who see it (default: 100).
    #[serde(default = "full_rollout")]
    pub rollout_percent: u8,
}

const fn full_rollout() -> u8 {
    100
}

/// Create or replace a flag and drop the cache.
pub async fn upsert_flag(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(key): Path<String>,
    Json(body): Json<UpsertFlagRequest>,
) -> Result<Json<FeatureFlag>, ApiError> {
    let mut flag = FeatureFlag::new(key, body.enabled);
    flag.description = body.description;
    flag.rollout_percent = body.rollout_percent;
    flag.validate()?;

    state.store.put_flag(&flag).await?;
    state.flags.invalidate().await;

    tracing::info!(
        admin_id = %admin.admin_id,
        key = %flag.key,
        enabled = flag.enabled,
        rollout_percent = flag.rollout_percent,
        "Feature flag updated"
    );

    Ok(Json(flag))
}

/// Delete a flag and drop the cache.
pub async fn delete_flag(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.store.delete_flag(&key).await? {
        return Err(ApiError::NotFound(format!("Flag not found: {key}")));
    }
    state.flags.invalidate().await;
    tracing::info!(admin_id = %admin.admin_id, key = %key, "Feature flag deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Moderation
// ============================================================================

/// Report list query parameters.
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// Only reports in this status.
    #[serde(default)]
    pub status: Option<ReportStatus>,
    /// Maximum rows (default: 50, max 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Reports, newest first.
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<ModerationReport>>, ApiError> {
    let reports = state
        .store
        .list_reports(query.status, query.limit.clamp(1, MAX_PAGE_SIZE))
        .await?;
    Ok(Json(reports))
}

/// Resolve request.
#[derive(Debug, Deserialize)]
pub struct ResolveReportRequest {
    /// `resolved` (default) or `dismissed`.
    #[serde(default = "resolved")]
    pub status: ReportStatus,
    /// Moderator note.
    #[serde(default)]
    pub note: Option<String>,
}

const fn resolved() -> ReportStatus {
    ReportStatus::Resolved
}

/// Close an open report.
pub async fn resolve_report(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<ResolveReportRequest>,
) -> Result<Json<ModerationReport>, ApiError> {
    let id: ReportId = id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid report id".into()))?;

    let mut report = state
        .store
        .get_report(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Report not found".into()))?;

    report
        .close(body.status, body.note)
        .map_err(|e| ApiError::Conflict(e.to_string()))?;
    state.store.update_report(&report).await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        report_id = %report.id,
        status = report.status.as_str(),
        "Moderation report closed"
    );

    Ok(Json(report))
}

// ============================================================================
// Grants CRM
// ============================================================================

/// Grant list query parameters.
#[derive(Debug, Deserialize)]
pub struct GrantQuery {
    /// Only grants in this stage.
    #[serde(default)]
    pub status: Option<GrantStatus>,
}

/// Grants by deadline, undated last.
pub async fn list_grants(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Query(query): Query<GrantQuery>,
) -> Result<Json<Vec<Grant>>, ApiError> {
    Ok(Json(state.store.list_grants(query.status).await?))
}

/// New grant request.
#[derive(Debug, Deserialize)]
pub struct CreateGrantRequest {
    /// Programme name.
    pub title: String,
    /// Funding body.
    pub funder: String,
    /// Amount in US cents.
    #[serde(default)]
    pub amount_cents: Option<i64>,
    /// Deadline (`YYYY-MM-DD`).
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    /// Starting stage (default: prospect).
    #[serde(default = "prospect")]
    pub status: GrantStatus,
    /// Notes.
    #[serde(default)]
    pub notes: String,
}

const fn prospect() -> GrantStatus {
    GrantStatus::Prospect
}

/// Track a new grant.
pub async fn create_grant(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<CreateGrantRequest>,
) -> Result<(StatusCode, Json<Grant>), ApiError> {
    require_text("title", &body.title, 200)?;
    require_text("funder", &body.funder, 200)?;
    if body.amount_cents.is_some_and(|a| a < 0) {
        return Err(ApiError::BadRequest("amount_cents must not be negative".into()));
    }

    let now = Utc::now();
    let grant = Grant {
        id: GrantId::generate(),
        title: body.title.trim().to_string(),
        funder: body.funder.trim().to_string(),
        amount_cents: body.amount_cents,
        deadline: body.deadline,
        status: body.status,
        notes: body.notes,
        created_at: now,
        updated_at: now,
    };
    state.store.put_grant(&grant).await?;

    tracing::info!(admin_id = %admin.admin_id, grant_id = %grant.id, "Grant created");
    Ok((StatusCode::CREATED, Json(grant)))
}

/// Grant update request. Absent fields are left alone.
#[derive(Debug, Deserialize)]
pub struct UpdateGrantRequest {
    /// New stage.
    #[serde(default)]
    pub status: Option<GrantStatus>,
    /// Replacement notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// New deadline.
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
}

/// Move a grant through the pipeline or edit its notes.
pub async fn update_grant(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<UpdateGrantRequest>,
) -> Result<Json<Grant>, ApiError> {
    let id: GrantId = id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid grant id".into()))?;

    let mut grant = state
        .store
        .get_grant(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Grant not found".into()))?;

    if let Some(status) = body.status {
        grant
            .transition(status)
            .map_err(|e| ApiError::Conflict(e.to_string()))?;
    }
    if let Some(notes) = body.notes {
        grant.notes = notes;
    }
    if body.deadline.is_some() {
        grant.deadline = body.deadline;
    }
    grant.updated_at = Utc::now();
    state.store.put_grant(&grant).await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        grant_id = %grant.id,
        status = grant.status.as_str(),
        "Grant updated"
    );

    Ok(Json(grant))
}

// ============================================================================
// Marketplace
// ============================================================================

/// New vendor request.
#[derive(Debug, Deserialize)]
pub struct CreateVendorRequest {
    /// Display name.
    pub name: String,
    /// Category slug; must exist.
    pub category_slug: String,
    /// Homepage.
    #[serde(default)]
    pub website: Option<String>,
    /// Blurb.
    #[serde(default)]
    pub description: String,
    /// Vetted by staff.
    #[serde(default)]
    pub verified: bool,
}

/// Add a marketplace vendor.
pub async fn create_vendor(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<CreateVendorRequest>,
) -> Result<(StatusCode, Json<Vendor>), ApiError> {
    require_text("name", &body.name, 120)?;
    if let Some(site) = &body.website {
        if !(site.starts_with("https://") || site.starts_with("http://")) {
            return Err(ApiError::BadRequest("website must be an http(s) URL".into()));
        }
    }

    let vendor = Vendor {
        id: VendorId::generate(),
        name: body.name.trim().to_string(),
        category_slug: body.category_slug,
        website: body.website,
        description: body.description,
        verified: body.verified,
        created_at: Utc::now(),
    };

    match state.store.create_vendor(&vendor).await {
        Ok(()) => {}
        Err(StoreError::NotFound { .. }) => {
            return Err(ApiError::BadRequest(format!(
                "Unknown category: {}",
                vendor.category_slug
            )));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(admin_id = %admin.admin_id, vendor_id = %vendor.id, "Vendor created");
    Ok((StatusCode::CREATED, Json(vendor)))
}

// ============================================================================
// Credits
// ============================================================================

/// Admin credit grant request.
#[derive(Debug, Deserialize)]
pub struct GrantCreditsRequest {
    /// Recipient.
    pub user_id: UserId,
    /// Credits to add.
    pub credits: i64,
    /// Shown in the user's ledger.
    pub reason: String,
}

/// Admin credit grant response.
#[derive(Debug, Serialize)]
pub struct GrantCreditsResponse {
    /// Ledger row.
    pub transaction_id: String,
    /// Balance afterwards.
    pub balance: i64,
}

/// Add bonus credits to a user's account.
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<GrantCreditsRequest>,
) -> Result<Json<GrantCreditsResponse>, ApiError> {
    if body.credits <= 0 || body.credits > MAX_ADMIN_GRANT {
        return Err(ApiError::BadRequest(format!(
            "credits must be between 1 and {MAX_ADMIN_GRANT}"
        )));
    }
    require_text("reason", &body.reason, 200)?;

    state.store.get_or_create_account(&body.user_id).await?;

    let tx = CreditTransaction::bonus(body.user_id, body.credits, body.reason.trim().to_string())
        .with_external_ref(format!("admin:{}", admin.admin_id));
    let balance = state.store.credit(&tx).await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %body.user_id,
        credits = body.credits,
        balance,
        "Admin credit grant"
    );

    Ok(Json(GrantCreditsResponse {
        transaction_id: tx.id.to_string(),
        balance,
    }))
}
