//! PostgreSQL storage implementation.
//!
//! Ledger operations run inside one database transaction: the balance update
//! is a conditional `UPDATE ... RETURNING balance` and the ledger row is
//! inserted with that returned value.

use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};

use crav_core::{
    Category, Collectible, CollectibleId, CreditAccount, CreditTransaction, CronLease,
    FeatureFlag, Grant, GrantId, GrantStatus, ModerationReport, ReportId, ReportStatus,
    Subscriber, TransactionId, TransactionKind, UserId, Vendor, VendorId, SIGNUP_BONUS_CREDITS,
};

use crate::error::{Result, StoreError};
use crate::{schema, CollectibleQuery, Store};

const ACCOUNT_COLUMNS: &str = "user_id, balance, lifetime_purchased, lifetime_granted, \
     lifetime_spent, lifetime_refunded, plan, subscription_status, subscription_period_end, \
     stripe_customer_id, stripe_subscription_id, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, user_id, amount, kind, balance_after, feature, \
     description, refund_of, external_ref, metadata, created_at";

const REPORT_COLUMNS: &str = "id, reporter_id, target_type, target_id, reason, details, status, \
     created_at, resolved_at, resolution_note";

const COLLECTIBLE_COLUMNS: &str = "id, owner_id, kind, title, artist_or_publisher, year, \
     condition, estimated_value_cents, created_at";

const GRANT_COLUMNS: &str =
    "id, title, funder, amount_cents, deadline, status, notes, created_at, updated_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `database_url` with a bounded pool.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the connection cannot be opened.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        schema::run_migrations(&self.pool).await
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn parse<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StoreError::Serialization(e.to_string()))
}

fn parse_opt<T>(value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    value.as_deref().map(parse).transpose()
}

fn limit_param(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn account_from_row(row: &PgRow) -> Result<CreditAccount> {
    Ok(CreditAccount {
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        balance: row.try_get("balance")?,
        lifetime_purchased: row.try_get("lifetime_purchased")?,
        lifetime_granted: row.try_get("lifetime_granted")?,
        lifetime_spent: row.try_get("lifetime_spent")?,
        lifetime_refunded: row.try_get("lifetime_refunded")?,
        plan: parse(row.try_get::<&str, _>("plan")?)?,
        subscription_status: parse_opt(row.try_get("subscription_status")?)?,
        subscription_period_end: row.try_get("subscription_period_end")?,
        stripe_customer_id: row.try_get("stripe_customer_id")?,
        stripe_subscription_id: row.try_get("stripe_subscription_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<CreditTransaction> {
    Ok(CreditTransaction {
        id: parse(row.try_get::<&str, _>("id")?)?,
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        amount: row.try_get("amount")?,
        kind: parse(row.try_get::<&str, _>("kind")?)?,
        balance_after: row.try_get("balance_after")?,
        feature: row.try_get("feature")?,
        description: row.try_get("description")?,
        refund_of: parse_opt(row.try_get("refund_of")?)?,
        external_ref: row.try_get("external_ref")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

fn flag_from_row(row: &PgRow) -> Result<FeatureFlag> {
    let rollout: i16 = row.try_get("rollout_percent")?;
    Ok(FeatureFlag {
        key: row.try_get("key")?,
        enabled: row.try_get("enabled")?,
        description: row.try_get("description")?,
        rollout_percent: u8::try_from(rollout)
            .map_err(|_| StoreError::Serialization(format!("rollout_percent {rollout}")))?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn subscriber_from_row(row: &PgRow) -> Result<Subscriber> {
    Ok(Subscriber {
        email: row.try_get("email")?,
        source: row.try_get("source")?,
        subscribed_at: row.try_get("subscribed_at")?,
        unsubscribed_at: row.try_get("unsubscribed_at")?,
    })
}

fn report_from_row(row: &PgRow) -> Result<ModerationReport> {
    Ok(ModerationReport {
        id: ReportId::from_uuid(row.try_get("id")?),
        reporter_id: UserId::from_uuid(row.try_get("reporter_id")?),
        target_type: parse(row.try_get::<&str, _>("target_type")?)?,
        target_id: row.try_get("target_id")?,
        reason: row.try_get("reason")?,
        details: row.try_get("details")?,
        status: parse(row.try_get::<&str, _>("status")?)?,
        created_at: row.try_get("created_at")?,
        resolved_at: row.try_get("resolved_at")?,
        resolution_note: row.try_get("resolution_note")?,
    })
}

fn category_from_row(row: &PgRow) -> Result<Category> {
    Ok(Category {
        slug: row.try_get("slug")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        sort_order: row.try_get("sort_order")?,
    })
}

fn vendor_from_row(row: &PgRow) -> Result<Vendor> {
    Ok(Vendor {
        id: VendorId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        category_slug: row.try_get("category_slug")?,
        website: row.try_get("website")?,
        description: row.try_get("description")?,
        verified: row.try_get("verified")?,
        created_at: row.try_get("created_at")?,
    })
}

fn collectible_from_row(row: &PgRow) -> Result<Collectible> {
    Ok(Collectible {
        id: CollectibleId::from_uuid(row.try_get("id")?),
        owner_id: UserId::from_uuid(row.try_get("owner_id")?),
        kind: parse(row.try_get::<&str, _>("kind")?)?,
        title: row.try_get("title")?,
        artist_or_publisher: row.try_get("artist_or_publisher")?,
        year: row.try_get("year")?,
        condition: row.try_get("condition")?,
        estimated_value_cents: row.try_get("estimated_value_cents")?,
        created_at: row.try_get("created_at")?,
    })
}

fn grant_from_row(row: &PgRow) -> Result<Grant> {
    Ok(Grant {
        id: GrantId::from_uuid(row.try_get("id")?),
        title: row.try_get("title")?,
        funder: row.try_get("funder")?,
        amount_cents: row.try_get("amount_cents")?,
        deadline: row.try_get("deadline")?,
        status: parse(row.try_get::<&str, _>("status")?)?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// Ledger helpers (run on an open transaction)
// ============================================================================

async fn insert_transaction(
    conn: &mut PgConnection,
    transaction: &CreditTransaction,
    balance_after: i64,
) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO credit_transactions ({TRANSACTION_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
    ))
    .bind(transaction.id.to_string())
    .bind(transaction.user_id.as_uuid())
    .bind(transaction.amount)
    .bind(transaction.kind.as_str())
    .bind(balance_after)
    .bind(transaction.feature.as_deref())
    .bind(&transaction.description)
    .bind(transaction.refund_of.map(|id| id.to_string()))
    .bind(transaction.external_ref.as_deref())
    .bind(&transaction.metadata)
    .bind(transaction.created_at)
    .execute(conn)
    .await
    .map_err(|e| {
        let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
        match transaction.refund_of {
            Some(original) if duplicate => StoreError::AlreadyRefunded {
                transaction_id: original.to_string(),
            },
            _ => e.into(),
        }
    })?;
    Ok(())
}

async fn apply_credit(conn: &mut PgConnection, transaction: &CreditTransaction) -> Result<i64> {
    let lifetime = match transaction.kind {
        TransactionKind::Purchase => ", lifetime_purchased = lifetime_purchased + $2",
        TransactionKind::Refund => ", lifetime_refunded = lifetime_refunded + $2",
        TransactionKind::PlanGrant | TransactionKind::Bonus | TransactionKind::SignupBonus => {
            ", lifetime_granted = lifetime_granted + $2"
        }
        TransactionKind::Spend => "",
    };

    let row = sqlx::query(&format!(
        "UPDATE credit_accounts SET balance = balance + $2{lifetime}, updated_at = now() \
         WHERE user_id = $1 RETURNING balance"
    ))
    .bind(transaction.user_id.as_uuid())
    .bind(transaction.amount)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::not_found("account", transaction.user_id))?;

    let balance: i64 = row.try_get("balance")?;
    insert_transaction(conn, transaction, balance).await?;
    Ok(balance)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Credit accounts
    // =========================================================================

    async fn get_or_create_account(&self, user_id: &UserId) -> Result<CreditAccount> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query(
            "INSERT INTO credit_accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id.as_uuid())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if created {
            let bonus = CreditTransaction::signup_bonus(*user_id, SIGNUP_BONUS_CREDITS);
            apply_credit(&mut tx, &bonus).await?;
        }

        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM credit_accounts WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;
        let account = account_from_row(&row)?;

        tx.commit().await?;
        if created {
            tracing::info!(user_id = %user_id, "Credit account created");
        }
        Ok(account)
    }

    async fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>> {
        sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM credit_accounts WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(account_from_row)
        .transpose()
    }

    async fn find_account_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<CreditAccount>> {
        sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM credit_accounts WHERE stripe_customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(account_from_row)
        .transpose()
    }

    async fn update_subscription(&self, account: &CreditAccount) -> Result<()> {
        let result = sqlx::query(
            "UPDATE credit_accounts SET plan = $2, subscription_status = $3, \
             subscription_period_end = $4, stripe_customer_id = $5, \
             stripe_subscription_id = $6, updated_at = now() WHERE user_id = $1",
        )
        .bind(account.user_id.as_uuid())
        .bind(account.plan.as_str())
        .bind(account.subscription_status.map(|s| s.as_str()))
        .bind(account.subscription_period_end)
        .bind(account.stripe_customer_id.as_deref())
        .bind(account.stripe_subscription_id.as_deref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("account", account.user_id));
        }
        Ok(())
    }

    async fn accounts_due_for_grant(&self, now: DateTime<Utc>) -> Result<Vec<CreditAccount>> {
        sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM credit_accounts \
             WHERE subscription_status = 'active' AND plan <> 'free' \
             AND subscription_period_end <= $1 ORDER BY subscription_period_end"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(account_from_row)
        .collect()
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    async fn spend(&self, transaction: &CreditTransaction) -> Result<i64> {
        let required = transaction.amount.abs();
        let user = transaction.user_id.as_uuid();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE credit_accounts SET balance = balance - $2, \
             lifetime_spent = lifetime_spent + $2, updated_at = now() \
             WHERE user_id = $1 AND balance >= $2 RETURNING balance",
        )
        .bind(user)
        .bind(required)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            let balance: Option<i64> =
                sqlx::query_scalar("SELECT balance FROM credit_accounts WHERE user_id = $1")
                    .bind(user)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match balance {
                Some(balance) => StoreError::InsufficientCredits { balance, required },
                None => StoreError::not_found("account", transaction.user_id),
            });
        };

        let balance: i64 = row.try_get("balance")?;
        insert_transaction(&mut tx, transaction, balance).await?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn credit(&self, transaction: &CreditTransaction) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let balance = apply_credit(&mut tx, transaction).await?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn credit_once(
        &self,
        event_id: &str,
        source: &str,
        transaction: &CreditTransaction,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let fresh = sqlx::query(
            "INSERT INTO processed_events (event_id, source) VALUES ($1, $2) \
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(source)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !fresh {
            return Err(StoreError::DuplicateEvent {
                event_id: event_id.to_string(),
            });
        }

        let balance = apply_credit(&mut tx, transaction).await?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn grant_plan_credits(
        &self,
        transaction: &CreditTransaction,
        now: DateTime<Utc>,
        next_period_end: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;
        // The row lock taken here serializes overlapping cron runs.
        let claimed = sqlx::query(
            "UPDATE credit_accounts SET subscription_period_end = $2, updated_at = now() \
             WHERE user_id = $1 AND plan <> 'free' AND subscription_status = 'active' \
             AND subscription_period_end <= $3",
        )
        .bind(transaction.user_id.as_uuid())
        .bind(next_period_end)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            return Ok(None);
        }
        let balance = apply_credit(&mut tx, transaction).await?;
        tx.commit().await?;
        Ok(Some(balance))
    }

    async fn get_transaction(&self, id: &TransactionId) -> Result<Option<CreditTransaction>> {
        sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM credit_transactions WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(transaction_from_row)
        .transpose()
    }

    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM credit_transactions WHERE user_id = $1 \
             ORDER BY id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id.as_uuid())
        .bind(limit_param(limit))
        .bind(limit_param(offset))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(transaction_from_row)
        .collect()
    }

    // =========================================================================
    // Processed events
    // =========================================================================

    async fn record_event(&self, event_id: &str, source: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO processed_events (event_id, source) VALUES ($1, $2) \
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(source)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn forget_event(&self, event_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM processed_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Feature flags
    // =========================================================================

    async fn list_flags(&self) -> Result<Vec<FeatureFlag>> {
        sqlx::query(
            "SELECT key, enabled, description, rollout_percent, updated_at \
             FROM feature_flags ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(flag_from_row)
        .collect()
    }

    async fn put_flag(&self, flag: &FeatureFlag) -> Result<()> {
        sqlx::query(
            "INSERT INTO feature_flags (key, enabled, description, rollout_percent, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (key) DO UPDATE SET enabled = EXCLUDED.enabled, \
             description = EXCLUDED.description, rollout_percent = EXCLUDED.rollout_percent, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(&flag.key)
        .bind(flag.enabled)
        .bind(&flag.description)
        .bind(i16::from(flag.rollout_percent))
        .bind(flag.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_flag(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feature_flags WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Cron locks
    // =========================================================================

    async fn try_acquire_lock(&self, lease: &CronLease) -> Result<bool> {
        let expired = sqlx::query("DELETE FROM cron_locks WHERE job_name = $1 AND expires_at <= $2")
            .bind(&lease.job_name)
            .bind(lease.acquired_at)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if expired > 0 {
            tracing::warn!(job = %lease.job_name, "Removed expired cron lock");
        }

        let result = sqlx::query(
            "INSERT INTO cron_locks (job_name, holder, acquired_at, expires_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (job_name) DO NOTHING",
        )
        .bind(&lease.job_name)
        .bind(&lease.holder)
        .bind(lease.acquired_at)
        .bind(lease.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_lock(&self, job_name: &str, holder: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cron_locks WHERE job_name = $1 AND holder = $2")
            .bind(job_name)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_locks(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cron_locks WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Newsletter
    // =========================================================================

    async fn subscribe(&self, email: &str, source: &str) -> Result<Subscriber> {
        let row = sqlx::query(
            "INSERT INTO newsletter_subscribers (email, source) VALUES ($1, $2) \
             ON CONFLICT (email) DO UPDATE SET \
             subscribed_at = CASE WHEN newsletter_subscribers.unsubscribed_at IS NULL \
                 THEN newsletter_subscribers.subscribed_at ELSE now() END, \
             unsubscribed_at = NULL \
             RETURNING email, source, subscribed_at, unsubscribed_at",
        )
        .bind(email)
        .bind(source)
        .fetch_one(&self.pool)
        .await?;
        subscriber_from_row(&row)
    }

    async fn unsubscribe(&self, email: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE newsletter_subscribers SET unsubscribed_at = COALESCE(unsubscribed_at, now()) \
             WHERE email = $1",
        )
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Moderation
    // =========================================================================

    async fn create_report(&self, report: &ModerationReport) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO moderation_reports ({REPORT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(report.id.as_uuid())
        .bind(report.reporter_id.as_uuid())
        .bind(report.target_type.as_str())
        .bind(&report.target_id)
        .bind(&report.reason)
        .bind(report.details.as_deref())
        .bind(report.status.as_str())
        .bind(report.created_at)
        .bind(report.resolved_at)
        .bind(report.resolution_note.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_report(&self, id: &ReportId) -> Result<Option<ModerationReport>> {
        sqlx::query(&format!(
            "SELECT {REPORT_COLUMNS} FROM moderation_reports WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(report_from_row)
        .transpose()
    }

    async fn list_reports(
        &self,
        status: Option<ReportStatus>,
        limit: usize,
    ) -> Result<Vec<ModerationReport>> {
        sqlx::query(&format!(
            "SELECT {REPORT_COLUMNS} FROM moderation_reports \
             WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(status.map(ReportStatus::as_str))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(report_from_row)
        .collect()
    }

    async fn update_report(&self, report: &ModerationReport) -> Result<()> {
        let result = sqlx::query(
            "UPDATE moderation_reports SET status = $2, resolved_at = $3, resolution_note = $4 \
             WHERE id = $1",
        )
        .bind(report.id.as_uuid())
        .bind(report.status.as_str())
        .bind(report.resolved_at)
        .bind(report.resolution_note.as_deref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("report", report.id));
        }
        Ok(())
    }

    // =========================================================================
    // Marketplace
    // =========================================================================

    async fn list_categories(&self) -> Result<Vec<Category>> {
        sqlx::query(
            "SELECT slug, name, description, sort_order FROM marketplace_categories \
             ORDER BY sort_order, slug",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(category_from_row)
        .collect()
    }

    async fn list_vendors(&self, category_slug: Option<&str>) -> Result<Vec<Vendor>> {
        sqlx::query(
            "SELECT id, name, category_slug, website, description, verified, created_at \
             FROM marketplace_vendors WHERE ($1::text IS NULL OR category_slug = $1) \
             ORDER BY name",
        )
        .bind(category_slug)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(vendor_from_row)
        .collect()
    }

    async fn create_vendor(&self, vendor: &Vendor) -> Result<()> {
        let category_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM marketplace_categories WHERE slug = $1)",
        )
        .bind(&vendor.category_slug)
        .fetch_one(&self.pool)
        .await?;
        if !category_exists {
            return Err(StoreError::not_found("category", &vendor.category_slug));
        }

        sqlx::query(
            "INSERT INTO marketplace_vendors \
             (id, name, category_slug, website, description, verified, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(vendor.id.as_uuid())
        .bind(&vendor.name)
        .bind(&vendor.category_slug)
        .bind(vendor.website.as_deref())
        .bind(&vendor.description)
        .bind(vendor.verified)
        .bind(vendor.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Collectibles
    // =========================================================================

    async fn list_collectibles(&self, query: &CollectibleQuery) -> Result<Vec<Collectible>> {
        let pattern = query.search.as_deref().map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        });

        sqlx::query(&format!(
            "SELECT {COLLECTIBLE_COLUMNS} FROM collectibles \
             WHERE ($1::text IS NULL OR kind = $1) \
             AND ($2::uuid IS NULL OR owner_id = $2) \
             AND ($3::text IS NULL OR title ILIKE $3 OR artist_or_publisher ILIKE $3) \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(query.kind.map(|k| k.as_str()))
        .bind(query.owner_id.map(|o| *o.as_uuid()))
        .bind(pattern)
        .bind(limit_param(query.limit))
        .bind(limit_param(query.offset))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(collectible_from_row)
        .collect()
    }

    async fn add_collectible(&self, item: &Collectible) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO collectibles ({COLLECTIBLE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(item.id.as_uuid())
        .bind(item.owner_id.as_uuid())
        .bind(item.kind.as_str())
        .bind(&item.title)
        .bind(item.artist_or_publisher.as_deref())
        .bind(item.year)
        .bind(item.condition.as_deref())
        .bind(item.estimated_value_cents)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_collectible(&self, id: &CollectibleId, owner_id: &UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM collectibles WHERE id = $1 AND owner_id = $2")
            .bind(id.as_uuid())
            .bind(owner_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Grants CRM
    // =========================================================================

    async fn list_grants(&self, status: Option<GrantStatus>) -> Result<Vec<Grant>> {
        sqlx::query(&format!(
            "SELECT {GRANT_COLUMNS} FROM grants WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY deadline ASC NULLS LAST, created_at ASC"
        ))
        .bind(status.map(GrantStatus::as_str))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(grant_from_row)
        .collect()
    }

    async fn get_grant(&self, id: &GrantId) -> Result<Option<Grant>> {
        sqlx::query(&format!("SELECT {GRANT_COLUMNS} FROM grants WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(grant_from_row)
            .transpose()
    }

    async fn put_grant(&self, grant: &Grant) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO grants ({GRANT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title, funder = EXCLUDED.funder, \
             amount_cents = EXCLUDED.amount_cents, deadline = EXCLUDED.deadline, \
             status = EXCLUDED.status, notes = EXCLUDED.notes, updated_at = EXCLUDED.updated_at"
        ))
        .bind(grant.id.as_uuid())
        .bind(&grant.title)
        .bind(&grant.funder)
        .bind(grant.amount_cents)
        .bind(grant.deadline)
        .bind(grant.status.as_str())
        .bind(&grant.notes)
        .bind(grant.created_at)
        .bind(grant.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
