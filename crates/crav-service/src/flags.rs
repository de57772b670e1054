//! Process-local feature flag cache.
//!
//! The whole flag table is loaded at once and served from memory until the
//! TTL passes. Admin writes call [`FlagCache::invalidate`] so the next read
//! reloads.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crav_core::{FeatureFlag, UserId};
use crav_store::{Store, StoreError};

#[derive(Default)]
struct Snapshot {
    flags: HashMap<String, FeatureFlag>,
    loaded_at: Option<Instant>,
}

impl Snapshot {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.loaded_at.is_some_and(|at| at.elapsed() < ttl)
    }
}

/// TTL cache over the `feature_flags` table.
pub struct FlagCache {
    ttl: Duration,
    snapshot: RwLock<Snapshot>,
}

impl FlagCache {
    /// Create an empty cache; the first read loads the table.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Look up a flag, reloading the table if the snapshot is stale.
    ///
    /// # Errors
    ///
    /// Returns the store error if a reload fails.
    pub async fn get(&self, store: &dyn Store, key: &str) -> Result<Option<FeatureFlag>, StoreError> {
        {
            let snapshot = self.snapshot.read().await;
            if snapshot.is_fresh(self.ttl) {
                return Ok(snapshot.flags.get(key).cloned());
            }
        }

        let mut snapshot = self.snapshot.write().await;
        // Another task may have reloaded while we waited for the lock.
        if !snapshot.is_fresh(self.ttl) {
            let flags = store.list_flags().await?;
            tracing::debug!(count = flags.len(), "Feature flag cache reloaded");
            snapshot.flags = flags.into_iter().map(|f| (f.key.clone(), f)).collect();
            snapshot.loaded_at = Some(Instant::now());
        }
        Ok(snapshot.flags.get(key).cloned())
    }

    /// Whether `key` is on for `user`. Unknown flags are off.
    ///
    /// # Errors
    ///
    /// Returns the store error if a reload fails.
    pub async fn is_enabled(
        &self,
        store: &dyn Store,
        key: &str,
        user: Option<&UserId>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .get(store, key)
            .await?
            .is_some_and(|flag| flag.is_enabled_for(user)))
    }

    /// Drop the snapshot so the next read reloads.
    pub async fn invalidate(&self) {
        self.snapshot.write().await.loaded_at = None;
    }

    /// Time since the last reload, if any.
    pub async fn age(&self) -> Option<Duration> {
        self.snapshot.read().await.loaded_at.map(|at| at.elapsed())
    }

    /// Configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crav_store::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn serves_cached_value_until_ttl() {
        let store = MemoryStore::new();
        let cache = FlagCache::new(Duration::from_secs(60));
        store.put_flag(&FeatureFlag::new("new-editor", true)).await.unwrap();

        assert!(cache.is_enabled(&store, "new-editor", None).await.unwrap());

        store.put_flag(&FeatureFlag::new("new-editor", false)).await.unwrap();
        assert!(cache.is_enabled(&store, "new-editor", None).await.unwrap());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!cache.is_enabled(&store, "new-editor", None).await.unwrap());
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let store = MemoryStore::new();
        let cache = FlagCache::new(Duration::from_secs(60));
        assert!(cache.get(&store, "beta").await.unwrap().is_none());
        assert!(cache.age().await.is_some());

        store.put_flag(&FeatureFlag::new("beta", true)).await.unwrap();
        assert!(cache.get(&store, "beta").await.unwrap().is_none());

        cache.invalidate().await;
        assert!(cache.get(&store, "beta").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_flags_are_disabled() {
        let store = MemoryStore::new();
        let cache = FlagCache::new(Duration::from_secs(60));
        let user = UserId::generate();
        assert!(!cache.is_enabled(&store, "nope", Some(&user)).await.unwrap());
    }
}
