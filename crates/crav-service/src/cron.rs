//! Scheduled jobs guarded by the cron lock.
//!
//! An external scheduler hits `POST /api/cron/{job}`. Each run takes a lease
//! row in `cron_locks`; a second instance arriving while the lease is live
//! gets [`LockOutcome::Skipped`] instead of running the job twice.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crav_core::lease::new_holder_id;
use crav_core::{CreditAccount, CreditTransaction, CronLease, LockOutcome};
use crav_store::Store;

use crate::error::ApiError;
use crate::state::AppState;

/// Processed-event rows older than this are purged by `cleanup`.
pub const EVENT_RETENTION_DAYS: i64 = 30;

/// A job runnable through `/api/cron/{job}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronJob {
    /// Grant monthly plan credits.
    MonthlyCredits,
    /// Purge expired locks and old processed events.
    Cleanup,
}

impl CronJob {
    /// Path segment and lock name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MonthlyCredits => "monthly-credits",
            Self::Cleanup => "cleanup",
        }
    }

    /// Parse a path segment.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "monthly-credits" => Some(Self::MonthlyCredits),
            "cleanup" => Some(Self::Cleanup),
            _ => None,
        }
    }
}

/// What a job did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum JobReport {
    /// `monthly-credits` result.
    MonthlyCredits {
        /// Accounts credited.
        accounts_granted: u64,
        /// Credits granted in total.
        credits_granted: i64,
        /// Accounts whose grant failed.
        failures: u64,
    },
    /// `cleanup` result.
    Cleanup {
        /// Expired leases removed.
        locks_purged: u64,
        /// Processed-event rows removed.
        events_purged: u64,
    },
}

/// Run `job` while holding the lease for `job_name`.
///
/// The lease is released whether `job` succeeds or fails. Returns
/// `LockOutcome::Skipped` when another holder has a live lease.
///
/// # Errors
///
/// Store errors from acquiring the lease, or the job's own error.
pub async fn run_locked<F, Fut, T>(
    store: &dyn Store,
    job_name: &str,
    instance: &str,
    ttl: Duration,
    job: F,
) -> Result<LockOutcome<T>, ApiError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let holder = new_holder_id(instance);
    let lease = CronLease::new(job_name, &holder, ttl, Utc::now())?;

    if !store.try_acquire_lock(&lease).await? {
        tracing::info!(job = job_name, "Cron job already running, skipping");
        return Ok(LockOutcome::Skipped);
    }

    tracing::info!(job = job_name, holder = %holder, "Cron lock acquired");
    let result = job().await;

    match store.release_lock(job_name, &holder).await {
        Ok(true) => tracing::debug!(job = job_name, "Cron lock released"),
        Ok(false) => tracing::warn!(job = job_name, "Cron lock expired before release"),
        Err(e) => tracing::error!(job = job_name, error = %e, "Failed to release cron lock"),
    }

    result.map(LockOutcome::Ran)
}

/// Run a job under its lock with the configured lease length.
///
/// # Errors
///
/// See [`run_locked`].
pub async fn run_job(state: &AppState, job: CronJob) -> Result<LockOutcome<JobReport>, ApiError> {
    let ttl = Duration::seconds(i64::try_from(state.config.cron_lock_ttl_seconds).unwrap_or(600));
    let store = state.store.as_ref();

    run_locked(store, job.name(), &state.config.instance_name, ttl, move || async move {
        let now = Utc::now();
        match job {
            CronJob::MonthlyCredits => grant_monthly_credits(store, now).await,
            CronJob::Cleanup => cleanup(store, now).await,
        }
    })
    .await
}

/// Grant one account its plan credits for the period that ended.
///
/// Returns `None` when the account is no longer due, which happens when
/// another run already granted this period.
async fn grant_account(
    store: &dyn Store,
    account: &CreditAccount,
    now: DateTime<Utc>,
) -> Result<Option<i64>, ApiError> {
    let credits = account.plan.monthly_credits();
    let tx = CreditTransaction::plan_grant(account.user_id, credits, account.plan.as_str());
    Ok(store
        .grant_plan_credits(&tx, now, account.next_period_end(now))
        .await?)
}

async fn grant_monthly_credits(store: &dyn Store, now: DateTime<Utc>) -> Result<JobReport, ApiError> {
    let due = store.accounts_due_for_grant(now).await?;
    let mut accounts_granted = 0;
    let mut credits_granted = 0;
    let mut failures = 0;

    for account in due {
        let credits = account.plan.monthly_credits();
        if credits == 0 {
            continue;
        }

        match grant_account(store, &account, now).await {
            Ok(Some(balance)) => {
                accounts_granted += 1;
                credits_granted += credits;
                tracing::info!(
                    user_id = %account.user_id,
                    plan = account.plan.as_str(),
                    credits,
                    balance,
                    "Monthly credits granted"
                );
            }
            Ok(None) => {
                tracing::info!(user_id = %account.user_id, "Period already granted, skipping");
            }
            Err(e) => {
                failures += 1;
                tracing::error!(user_id = %account.user_id, error = %e, "Monthly grant failed");
            }
        }
    }

    Ok(JobReport::MonthlyCredits {
        accounts_granted,
        credits_granted,
        failures,
    })
}

async fn cleanup(store: &dyn Store, now: DateTime<Utc>) -> Result<JobReport, ApiError> {
    let locks_purged = store.purge_expired_locks(now).await?;
    let events_purged = store
        .purge_events_before(now - Duration::days(EVENT_RETENTION_DAYS))
        .await?;
    tracing::info!(locks_purged, events_purged, "Cleanup finished");
    Ok(JobReport::Cleanup {
        locks_purged,
        events_purged,
    })
}
