//! Cron endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crav_core::LockOutcome;

use crate::auth::CronAuth;
use crate::cron::{run_job as run_locked_job, CronJob, JobReport};
use crate::error::ApiError;
use crate::state::AppState;

/// Cron response.
#[derive(Debug, Serialize)]
pub struct CronResponse {
    /// Job name.
    pub job: &'static str,
    /// `completed` or `skipped`.
    pub status: &'static str,
    /// What the job did, when it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobReport>,
}

/// Run a scheduled job under the cron lock.
pub async fn run_job(
    State(state): State<Arc<AppState>>,
    _auth: CronAuth,
    Path(job): Path<String>,
) -> Result<Json<CronResponse>, ApiError> {
    let job = CronJob::from_name(&job)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown cron job: {job}")))?;

    let response = match run_locked_job(&state, job).await? {
        LockOutcome::Ran(report) => CronResponse {
            job: job.name(),
            status: "completed",
            result: Some(report),
        },
        LockOutcome::Skipped => CronResponse {
            job: job.name(),
            status: "skipped",
            result: None,
        },
    };

    Ok(Json(response))
}
