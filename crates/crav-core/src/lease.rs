//! Cron lock leases.
//!
//! A lease is one row keyed by job name. Whoever inserts the row holds the
//! job until it releases the row or `expires_at` passes, after which the next
//! acquirer may replace it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A held (or previously held) cron lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronLease {
    /// Job the lease guards; unique.
    pub job_name: String,

    /// Opaque id of the invocation holding the lease.
    pub holder: String,

    /// When the lease was taken.
    pub acquired_at: DateTime<Utc>,

    /// When the lease lapses if not released.
    pub expires_at: DateTime<Utc>,
}

impl CronLease {
    /// Build a lease for `job_name` starting at `now`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the job name is empty or the ttl is not positive.
    pub fn new(
        job_name: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        if job_name.trim().is_empty() {
            return Err(CoreError::InvalidInput("job name must not be empty".into()));
        }
        if ttl <= Duration::zero() {
            return Err(CoreError::InvalidInput("lease ttl must be positive".into()));
        }
        Ok(Self {
            job_name: job_name.to_string(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + ttl,
        })
    }

    /// Whether the lease has lapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Generate a holder id for one invocation.
#[must_use]
pub fn new_holder_id(instance: &str) -> String {
    format!("{instance}:{}", uuid::Uuid::new_v4())
}

/// Result of running a job under a lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome<T> {
    /// The lease was acquired and the job ran.
    Ran(T),
    /// Another holder had the lease; nothing ran.
    Skipped,
}

impl<T> LockOutcome<T> {
    /// Whether the job actually ran.
    #[must_use]
    pub const fn ran(&self) -> bool {
        matches!(self, Self::Ran(_))
    }
}
