//! Moderation report creation.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crav_core::catalog::require_text;
use crav_core::{ModerationReport, ReportId, ReportStatus, ReportTarget};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

const MAX_REASON_LEN: usize = 200;
const MAX_DETAILS_LEN: usize = 2000;
const MAX_TARGET_ID_LEN: usize = 128;

/// Report request.
#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    /// What is being reported.
    pub target_type: ReportTarget,
    /// Id of the reported thing.
    pub target_id: String,
    /// Short reason.
    pub reason: String,
    /// Optional free text.
    #[serde(default)]
    pub details: Option<String>,
}

/// File a moderation report.
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<ModerationReport>), ApiError> {
    require_text("target_id", &body.target_id, MAX_TARGET_ID_LEN)?;
    require_text("reason", &body.reason, MAX_REASON_LEN)?;
    let details = body
        .details
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if let Some(details) = &details {
        require_text("details", details, MAX_DETAILS_LEN)?;
    }

    let report = ModerationReport {
        id: ReportId::generate(),
        reporter_id: auth.user_id,
        target_type: body.target_type,
        target_id: body.target_id.trim().to_string(),
        reason: body.reason.trim().to_string(),
        details,
        status: ReportStatus::Open,
        created_at: Utc::now(),
        resolved_at: None,
        resolution_note: None,
    };
    state.store.create_report(&report).await?;

    tracing::info!(
        report_id = %report.id,
        reporter_id = %auth.user_id,
        target_type = report.target_type.as_str(),
        "Moderation report filed"
    );

    Ok((StatusCode::CREATED, Json(report)))
}
