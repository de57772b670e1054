//! In-memory storage implementation.
//!
//! Every operation takes the same mutex, so compound ledger updates are
//! atomic with respect to each other just like the `PgStore` transactions.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crav_core::{
    Category, Collectible, CollectibleId, CreditAccount, CreditTransaction, CronLease,
    FeatureFlag, Grant, GrantId, GrantStatus, ModerationReport, ReportId, ReportStatus,
    Subscriber, TransactionId, TransactionKind, UserId, Vendor, SIGNUP_BONUS_CREDITS,
};

use crate::error::{Result, StoreError};
use crate::schema::default_categories;
use crate::{CollectibleQuery, Store};

#[derive(Default)]
struct Inner {
    accounts: HashMap<UserId, CreditAccount>,
    transactions: BTreeMap<TransactionId, CreditTransaction>,
    refunded: HashSet<TransactionId>,
    events: HashMap<String, DateTime<Utc>>,
    flags: BTreeMap<String, FeatureFlag>,
    locks: HashMap<String, CronLease>,
    subscribers: HashMap<String, Subscriber>,
    reports: HashMap<ReportId, ModerationReport>,
    categories: BTreeMap<String, Category>,
    vendors: Vec<Vendor>,
    collectibles: Vec<Collectible>,
    grants: HashMap<GrantId, Grant>,
}

impl Inner {
    fn account_mut(&mut self, user_id: &UserId) -> Result<&mut CreditAccount> {
        self.accounts
            .get_mut(user_id)
            .ok_or_else(|| StoreError::not_found("account", user_id))
    }

    fn apply_credit(&mut self, transaction: &CreditTransaction) -> Result<i64> {
        if let Some(original) = transaction.refund_of {
            if self.refunded.contains(&original) {
                return Err(StoreError::AlreadyRefunded {
                    transaction_id: original.to_string(),
                });
            }
        }

        let amount = transaction.amount;
        let account = self.account_mut(&transaction.user_id)?;
        account.balance += amount;
        match transaction.kind {
            TransactionKind::Purchase => account.lifetime_purchased += amount,
            TransactionKind::Refund => account.lifetime_refunded += amount,
            TransactionKind::PlanGrant | TransactionKind::Bonus | TransactionKind::SignupBonus => {
                account.lifetime_granted += amount;
            }
            TransactionKind::Spend => {}
        }
        account.updated_at = Utc::now();
        let balance = account.balance;

        self.append(transaction, balance);
        Ok(balance)
    }

    fn append(&mut self, transaction: &CreditTransaction, balance_after: i64) {
        if let Some(original) = transaction.refund_of {
            self.refunded.insert(original);
        }
        let mut row = transaction.clone();
        row.balance_after = balance_after;
        self.transactions.insert(row.id, row);
    }
}

/// Process-local store.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store holding only the seeded marketplace categories.
    #[must_use]
    pub fn new() -> Self {
        let categories = default_categories()
            .into_iter()
            .map(|c| (c.slug.clone(), c))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                categories,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: usize, offset: usize) -> Vec<T> {
    items.skip(offset).take(limit).collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    // =========================================================================
    // Credit accounts
    // =========================================================================

    async fn get_or_create_account(&self, user_id: &UserId) -> Result<CreditAccount> {
        let mut inner = self.lock()?;
        if let Some(account) = inner.accounts.get(user_id) {
            return Ok(account.clone());
        }

        inner
            .accounts
            .insert(*user_id, CreditAccount::new(*user_id));
        let bonus = CreditTransaction::signup_bonus(*user_id, SIGNUP_BONUS_CREDITS);
        inner.apply_credit(&bonus)?;

        tracing::info!(user_id = %user_id, "Credit account created");
        inner
            .accounts
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("account", user_id))
    }

    async fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>> {
        Ok(self.lock()?.accounts.get(user_id).cloned())
    }

    async fn find_account_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<CreditAccount>> {
        Ok(self
            .lock()?
            .accounts
            .values()
            .find(|a| a.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn update_subscription(&self, account: &CreditAccount) -> Result<()> {
        let mut inner = self.lock()?;
        let stored = inner.account_mut(&account.user_id)?;
        stored.plan = account.plan;
        stored.subscription_status = account.subscription_status;
        stored.subscription_period_end = account.subscription_period_end;
        stored.stripe_customer_id.clone_from(&account.stripe_customer_id);
        stored
            .stripe_subscription_id
            .clone_from(&account.stripe_subscription_id);
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn accounts_due_for_grant(&self, now: DateTime<Utc>) -> Result<Vec<CreditAccount>> {
        Ok(self
            .lock()?
            .accounts
            .values()
            .filter(|a| a.monthly_grant_due(now))
            .cloned()
            .collect())
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    async fn spend(&self, transaction: &CreditTransaction) -> Result<i64> {
        let mut inner = self.lock()?;
        let required = transaction.amount.abs();
        let account = inner.account_mut(&transaction.user_id)?;

        if !account.has_sufficient_credits(required) {
            return Err(StoreError::InsufficientCredits {
                balance: account.balance,
                required,
            });
        }

        account.balance -= required;
        account.lifetime_spent += required;
        account.updated_at = Utc::now();
        let balance = account.balance;

        inner.append(transaction, balance);
        Ok(balance)
    }

    async fn credit(&self, transaction: &CreditTransaction) -> Result<i64> {
        self.lock()?.apply_credit(transaction)
    }

    async fn credit_once(
        &self,
        event_id: &str,
        source: &str,
        transaction: &CreditTransaction,
    ) -> Result<i64> {
        let mut inner = self.lock()?;
        if inner.events.contains_key(event_id) {
            return Err(StoreError::DuplicateEvent {
                event_id: event_id.to_string(),
            });
        }
        let balance = inner.apply_credit(transaction)?;
        inner.events.insert(event_id.to_string(), Utc::now());
        tracing::debug!(event_id, source, "Event recorded");
        Ok(balance)
    }

    async fn grant_plan_credits(
        &self,
        transaction: &CreditTransaction,
        now: DateTime<Utc>,
        next_period_end: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let mut inner = self.lock()?;
        if !inner.account_mut(&transaction.user_id)?.monthly_grant_due(now) {
            return Ok(None);
        }
        let balance = inner.apply_credit(transaction)?;
        let account = inner.account_mut(&transaction.user_id)?;
        account.subscription_period_end = Some(next_period_end);
        Ok(Some(balance))
    }

    async fn get_transaction(&self, id: &TransactionId) -> Result<Option<CreditTransaction>> {
        Ok(self.lock()?.transactions.get(id).cloned())
    }

    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let inner = self.lock()?;
        let rows = inner
            .transactions
            .values()
            .rev()
            .filter(|t| t.user_id == *user_id)
            .cloned();
        Ok(page(rows, limit, offset))
    }

    // =========================================================================
    // Processed events
    // =========================================================================

    async fn record_event(&self, event_id: &str, source: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.events.contains_key(event_id) {
            return Ok(false);
        }
        inner.events.insert(event_id.to_string(), Utc::now());
        tracing::debug!(event_id, source, "Event recorded");
        Ok(true)
    }

    async fn forget_event(&self, event_id: &str) -> Result<bool> {
        Ok(self.lock()?.events.remove(event_id).is_some())
    }

    async fn purge_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.lock()?;
        let before = inner.events.len();
        inner.events.retain(|_, seen| *seen >= cutoff);
        Ok((before - inner.events.len()) as u64)
    }

    // =========================================================================
    // Feature flags
    // =========================================================================

    async fn list_flags(&self) -> Result<Vec<FeatureFlag>> {
        Ok(self.lock()?.flags.values().cloned().collect())
    }

    async fn put_flag(&self, flag: &FeatureFlag) -> Result<()> {
        self.lock()?.flags.insert(flag.key.clone(), flag.clone());
        Ok(())
    }

    async fn delete_flag(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.flags.remove(key).is_some())
    }

    // =========================================================================
    // Cron locks
    // =========================================================================

    async fn try_acquire_lock(&self, lease: &CronLease) -> Result<bool> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.locks.get(&lease.job_name) {
            if !existing.is_expired(lease.acquired_at) {
                return Ok(false);
            }
            tracing::warn!(
                job = %lease.job_name,
                previous_holder = %existing.holder,
                "Taking over expired cron lock"
            );
        }
        inner.locks.insert(lease.job_name.clone(), lease.clone());
        Ok(true)
    }

    async fn release_lock(&self, job_name: &str, holder: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        let owned = inner
            .locks
            .get(job_name)
            .is_some_and(|lease| lease.holder == holder);
        if owned {
            inner.locks.remove(job_name);
        }
        Ok(owned)
    }

    async fn purge_expired_locks(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.lock()?;
        let before = inner.locks.len();
        inner.locks.retain(|_, lease| !lease.is_expired(now));
        Ok((before - inner.locks.len()) as u64)
    }

    // =========================================================================
    // Newsletter
    // =========================================================================

    async fn subscribe(&self, email: &str, source: &str) -> Result<Subscriber> {
        let mut inner = self.lock()?;
        let subscriber = inner
            .subscribers
            .entry(email.to_string())
            .or_insert_with(|| Subscriber {
                email: email.to_string(),
                source: source.to_string(),
                subscribed_at: Utc::now(),
                unsubscribed_at: None,
            });
        if !subscriber.is_active() {
            subscriber.subscribed_at = Utc::now();
            subscriber.unsubscribed_at = None;
        }
        Ok(subscriber.clone())
    }

    async fn unsubscribe(&self, email: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner.subscribers.get_mut(email) {
            Some(subscriber) => {
                subscriber.unsubscribed_at.get_or_insert_with(Utc::now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // Moderation
    // =========================================================================

    async fn create_report(&self, report: &ModerationReport) -> Result<()> {
        self.lock()?.reports.insert(report.id, report.clone());
        Ok(())
    }

    async fn get_report(&self, id: &ReportId) -> Result<Option<ModerationReport>> {
        Ok(self.lock()?.reports.get(id).cloned())
    }

    async fn list_reports(
        &self,
        status: Option<ReportStatus>,
        limit: usize,
    ) -> Result<Vec<ModerationReport>> {
        let inner = self.lock()?;
        let mut reports: Vec<_> = inner
            .reports
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports.truncate(limit);
        Ok(reports)
    }

    async fn update_report(&self, report: &ModerationReport) -> Result<()> {
        let mut inner = self.lock()?;
        let stored = inner
            .reports
            .get_mut(&report.id)
            .ok_or_else(|| StoreError::not_found("report", report.id))?;
        *stored = report.clone();
        Ok(())
    }

    // =========================================================================
    // Marketplace
    // =========================================================================

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<_> = self.lock()?.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.slug.cmp(&b.slug)));
        Ok(categories)
    }

    async fn list_vendors(&self, category_slug: Option<&str>) -> Result<Vec<Vendor>> {
        let inner = self.lock()?;
        let mut vendors: Vec<_> = inner
            .vendors
            .iter()
            .filter(|v| category_slug.map_or(true, |slug| v.category_slug == slug))
            .cloned()
            .collect();
        vendors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(vendors)
    }

    async fn create_vendor(&self, vendor: &Vendor) -> Result<()> {
        let mut inner = self.lock()?;
        if !inner.categories.contains_key(&vendor.category_slug) {
            return Err(StoreError::not_found("category", &vendor.category_slug));
        }
        inner.vendors.push(vendor.clone());
        Ok(())
    }

    // =========================================================================
    // Collectibles
    // =========================================================================

    async fn list_collectibles(&self, query: &CollectibleQuery) -> Result<Vec<Collectible>> {
        let inner = self.lock()?;
        let mut items: Vec<_> = inner
            .collectibles
            .iter()
            .filter(|c| query.kind.map_or(true, |k| c.kind == k))
            .filter(|c| query.owner_id.map_or(true, |o| c.owner_id == o))
            .filter(|c| query.search.as_deref().map_or(true, |q| c.matches(q)))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(items.into_iter(), query.limit, query.offset))
    }

    async fn add_collectible(&self, item: &Collectible) -> Result<()> {
        self.lock()?.collectibles.push(item.clone());
        Ok(())
    }

    async fn delete_collectible(&self, id: &CollectibleId, owner_id: &UserId) -> Result<bool> {
        let mut inner = self.lock()?;
        let before = inner.collectibles.len();
        inner
            .collectibles
            .retain(|c| !(c.id == *id && c.owner_id == *owner_id));
        Ok(inner.collectibles.len() < before)
    }

    // =========================================================================
    // Grants CRM
    // =========================================================================

    async fn list_grants(&self, status: Option<GrantStatus>) -> Result<Vec<Grant>> {
        let inner = self.lock()?;
        let mut grants: Vec<_> = inner
            .grants
            .values()
            .filter(|g| status.map_or(true, |s| g.status == s))
            .cloned()
            .collect();
        // Dated grants first, soonest deadline first.
        grants.sort_by(|a, b| match (a.deadline, b.deadline) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.created_at.cmp(&b.created_at),
        });
        Ok(grants)
    }

    async fn get_grant(&self, id: &GrantId) -> Result<Option<Grant>> {
        Ok(self.lock()?.grants.get(id).cloned())
    }

    async fn put_grant(&self, grant: &Grant) -> Result<()> {
        self.lock()?.grants.insert(grant.id, grant.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn new_account_gets_signup_bonus_once() {
        let store = MemoryStore::new();
        let user = UserId::generate();

        let account = store.get_or_create_account(&user).await.unwrap();
        assert_eq!(account.balance, SIGNUP_BONUS_CREDITS);

        let again = store.get_or_create_account(&user).await.unwrap();
        assert_eq!(again.balance, SIGNUP_BONUS_CREDITS);

        let ledger = store.list_transactions(&user, 10, 0).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, TransactionKind::SignupBonus);
        assert_eq!(ledger[0].balance_after, SIGNUP_BONUS_CREDITS);
    }

    #[tokio::test]
    async fn spend_cannot_overdraw() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        store.get_or_create_account(&user).await.unwrap();

        let too_much = CreditTransaction::spend(user, SIGNUP_BONUS_CREDITS + 1, "video_render", 1);
        let err = store.spend(&too_much).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientCredits { balance, required }
                if balance == SIGNUP_BONUS_CREDITS && required == SIGNUP_BONUS_CREDITS + 1
        ));

        let account = store.get_account(&user).await.unwrap().unwrap();
        assert_eq!(account.balance, SIGNUP_BONUS_CREDITS);
        assert_eq!(store.list_transactions(&user, 10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refund_applies_once() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        store.get_or_create_account(&user).await.unwrap();

        let spend = CreditTransaction::spend(user, 15, "audio_visualization", 1);
        assert_eq!(store.spend(&spend).await.unwrap(), SIGNUP_BONUS_CREDITS - 15);

        let refund = CreditTransaction::refund(&spend, "render failed");
        assert_eq!(store.credit(&refund).await.unwrap(), SIGNUP_BONUS_CREDITS);

        let second = CreditTransaction::refund(&spend, "retry");
        assert!(matches!(
            store.credit(&second).await,
            Err(StoreError::AlreadyRefunded { .. })
        ));
    }

    #[tokio::test]
    async fn refunds_are_tracked_per_spend() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        store.get_or_create_account(&user).await.unwrap();

        let first = CreditTransaction::spend(user, 10, "audio_visualization", 1);
        let second = CreditTransaction::spend(user, 5, "stem_split", 1);
        store.spend(&first).await.unwrap();
        store.spend(&second).await.unwrap();

        let refund_second = CreditTransaction::refund(&second, "timeout");
        assert_eq!(
            store.credit(&refund_second).await.unwrap(),
            SIGNUP_BONUS_CREDITS - 10
        );
        let refund_first = CreditTransaction::refund(&first, "timeout");
        assert_eq!(store.credit(&refund_first).await.unwrap(), SIGNUP_BONUS_CREDITS);

        for spend in [&first, &second] {
            let again = CreditTransaction::refund(spend, "retry");
            assert!(matches!(
                store.credit(&again).await,
                Err(StoreError::AlreadyRefunded { .. })
            ));
        }
        let account = store.get_account(&user).await.unwrap().unwrap();
        assert_eq!(account.lifetime_refunded, 15);
    }

    #[tokio::test]
    async fn credit_once_deduplicates() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        store.get_or_create_account(&user).await.unwrap();

        let tx = CreditTransaction::purchase(user, 500, "stripe", "cs_1");
        store.credit_once("cs_1", "stripe", &tx).await.unwrap();

        let replay = CreditTransaction::purchase(user, 500, "stripe", "cs_1");
        assert!(matches!(
            store.credit_once("cs_1", "stripe", &replay).await,
            Err(StoreError::DuplicateEvent { .. })
        ));
        let account = store.get_account(&user).await.unwrap().unwrap();
        assert_eq!(account.balance, SIGNUP_BONUS_CREDITS + 500);
        assert_eq!(account.lifetime_purchased, 500);
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_expiry() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let ttl = Duration::seconds(60);

        let first = CronLease::new("cleanup", "a", ttl, now).unwrap();
        assert!(store.try_acquire_lock(&first).await.unwrap());

        let rival = CronLease::new("cleanup", "b", ttl, now + Duration::seconds(10)).unwrap();
        assert!(!store.try_acquire_lock(&rival).await.unwrap());
        assert!(!store.release_lock("cleanup", "b").await.unwrap());

        let late = CronLease::new("cleanup", "b", ttl, now + Duration::seconds(61)).unwrap();
        assert!(store.try_acquire_lock(&late).await.unwrap());
        assert!(!store.release_lock("cleanup", "a").await.unwrap());
        assert!(store.release_lock("cleanup", "b").await.unwrap());
    }

    #[tokio::test]
    async fn ledger_lists_newest_first_with_paging() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        store.get_or_create_account(&user).await.unwrap();
        for _ in 0..3 {
            // ULIDs only order across milliseconds.
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            let tx = CreditTransaction::spend(user, 1, "chat_message", 1);
            store.spend(&tx).await.unwrap();
        }

        let all = store.list_transactions(&user, 10, 0).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].balance_after, SIGNUP_BONUS_CREDITS - 3);
        assert_eq!(all[3].kind, TransactionKind::SignupBonus);

        let second_page = store.list_transactions(&user, 2, 2).await.unwrap();
        assert_eq!(second_page.len(), 2);
        assert_eq!(second_page[0].id, all[2].id);
    }
}
