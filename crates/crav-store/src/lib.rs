//! Storage layer for the CR AudioViz AI back office.
//!
//! The [`Store`] trait covers every table the service touches. Two backends
//! implement it:
//!
//! - [`PgStore`]: PostgreSQL through `sqlx`, used against the Supabase
//!   database. Migrations live in `migrations/` and run on startup.
//! - [`MemoryStore`]: process-local maps behind one lock, for tests and for
//!   running the service without a database.
//!
//! # Ledger invariants
//!
//! Both backends apply a balance change and its ledger row together, and a
//! debit never leaves the balance below zero.
//!
//! # Example
//!
//! ```no_run
//! use crav_core::{CreditTransaction, UserId};
//! use crav_store::{MemoryStore, Store};
//!
//! # async fn demo() -> crav_store::Result<()> {
//! let store = MemoryStore::new();
//! let user_id = UserId::generate();
//! let account = store.get_or_create_account(&user_id).await?;
//!
//! let spend = CreditTransaction::spend(user_id, 5, "image_generation", 1);
//! let balance = store.spend(&spend).await?;
//! assert_eq!(balance, account.balance - 5);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crav_core::{
    Category, Collectible, CollectibleId, CollectibleKind, CreditAccount, CreditTransaction,
    CronLease, FeatureFlag, Grant, GrantId, GrantStatus, ModerationReport, ReportId,
    ReportStatus, Subscriber, TransactionId, UserId, Vendor,
};

/// Filter for listing collectibles.
#[derive(Debug, Clone, Default)]
pub struct CollectibleQuery {
    /// Only this catalog.
    pub kind: Option<CollectibleKind>,
    /// Only this owner.
    pub owner_id: Option<UserId>,
    /// Case-insensitive match on title or artist.
    pub search: Option<String>,
    /// Page size.
    pub limit: usize,
    /// Rows to skip.
    pub offset: usize,
}

/// The storage trait defining all database operations.
#[async_trait]
pub trait Store: Send + Sync {
    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    async fn ping(&self) -> Result<()>;

    // =========================================================================
    // Credit accounts
    // =========================================================================

    /// Get an account, creating it with the signup bonus if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_or_create_account(&self, user_id: &UserId) -> Result<CreditAccount>;

    /// Get an account by user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>>;

    /// Find the account linked to a Stripe customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_account_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<CreditAccount>>;

    /// Update the plan, subscription and Stripe fields of an account.
    ///
    /// Balance and lifetime counters are owned by the ledger operations and
    /// are not written here.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the account does not exist.
    async fn update_subscription(&self, account: &CreditAccount) -> Result<()>;

    /// Active subscriptions whose billing period ended at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn accounts_due_for_grant(&self, now: DateTime<Utc>) -> Result<Vec<CreditAccount>>;

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Debit an account by `-transaction.amount` and append the transaction.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::InsufficientCredits` if the balance is too low; nothing
    ///   is written in that case.
    async fn spend(&self, transaction: &CreditTransaction) -> Result<i64>;

    /// Credit an account by `transaction.amount` and append the transaction.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::AlreadyRefunded` if the transaction refunds a spend that
    ///   already has a refund.
    async fn credit(&self, transaction: &CreditTransaction) -> Result<i64>;

    /// Record `event_id` and credit the account in one step.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicateEvent` if the event was already recorded; the
    ///   balance is untouched.
    /// - Any error from [`Store::credit`].
    async fn credit_once(
        &self,
        event_id: &str,
        source: &str,
        transaction: &CreditTransaction,
    ) -> Result<i64>;

    /// Grant plan credits and roll the billing period in one step.
    ///
    /// The grant only applies while the account is still due at `now`
    /// (active paid plan, period ended). Returns the new balance, or `None`
    /// if the account is no longer due and nothing was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn grant_plan_credits(
        &self,
        transaction: &CreditTransaction,
        now: DateTime<Utc>,
        next_period_end: DateTime<Utc>,
    ) -> Result<Option<i64>>;

    /// Get a ledger row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_transaction(&self, id: &TransactionId) -> Result<Option<CreditTransaction>>;

    /// A user's ledger, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    // =========================================================================
    // Processed events (idempotency)
    // =========================================================================

    /// Record an external event id. Returns `false` if it was already seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn record_event(&self, event_id: &str, source: &str) -> Result<bool>;

    /// Remove a recorded event id so a failed delivery can be retried.
    /// Returns `false` if it was not recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn forget_event(&self, event_id: &str) -> Result<bool>;

    /// Drop processed-event rows older than `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn purge_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    // =========================================================================
    // Feature flags
    // =========================================================================

    /// All flags ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_flags(&self) -> Result<Vec<FeatureFlag>>;

    /// Insert or replace a flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_flag(&self, flag: &FeatureFlag) -> Result<()>;

    /// Delete a flag. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn delete_flag(&self, key: &str) -> Result<bool>;

    // =========================================================================
    // Cron locks
    // =========================================================================

    /// Try to take the lease for `lease.job_name`.
    ///
    /// Expired leases for the job are removed first. Returns `false` when a
    /// live lease is held by someone else.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn try_acquire_lock(&self, lease: &CronLease) -> Result<bool>;

    /// Release the lease if `holder` still owns it. Returns whether a row was
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn release_lock(&self, job_name: &str, holder: &str) -> Result<bool>;

    /// Remove every lease that expired at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn purge_expired_locks(&self, now: DateTime<Utc>) -> Result<u64>;

    // =========================================================================
    // Newsletter
    // =========================================================================

    /// Subscribe (or re-subscribe) a normalised address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn subscribe(&self, email: &str, source: &str) -> Result<Subscriber>;

    /// Mark an address unsubscribed. Returns `false` if unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn unsubscribe(&self, email: &str) -> Result<bool>;

    // =========================================================================
    // Moderation
    // =========================================================================

    /// Store a new report.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_report(&self, report: &ModerationReport) -> Result<()>;

    /// Get a report.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_report(&self, id: &ReportId) -> Result<Option<ModerationReport>>;

    /// Reports, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_reports(
        &self,
        status: Option<ReportStatus>,
        limit: usize,
    ) -> Result<Vec<ModerationReport>>;

    /// Persist a closed report.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the report does not exist.
    async fn update_report(&self, report: &ModerationReport) -> Result<()>;

    // =========================================================================
    // Marketplace
    // =========================================================================

    /// Categories by sort order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Vendors by name, optionally in one category.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_vendors(&self, category_slug: Option<&str>) -> Result<Vec<Vendor>>;

    /// Add a vendor.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the category does not exist.
    async fn create_vendor(&self, vendor: &Vendor) -> Result<()>;

    // =========================================================================
    // Collectibles
    // =========================================================================

    /// Items matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_collectibles(&self, query: &CollectibleQuery) -> Result<Vec<Collectible>>;

    /// Add an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn add_collectible(&self, item: &Collectible) -> Result<()>;

    /// Delete an item owned by `owner_id`. Returns `false` if no such item.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn delete_collectible(&self, id: &CollectibleId, owner_id: &UserId) -> Result<bool>;

    // =========================================================================
    // Grants CRM
    // =========================================================================

    /// Grants ordered by deadline (undated last), optionally by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_grants(&self, status: Option<GrantStatus>) -> Result<Vec<Grant>>;

    /// Get a grant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_grant(&self, id: &GrantId) -> Result<Option<Grant>>;

    /// Insert or replace a grant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_grant(&self, grant: &Grant) -> Result<()>;
}
