use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::usage::AggregateResult;

/// A published result and when it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: Arc<AggregateResult>,
    pub refreshed_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Older than `interval` at `now`.
    pub fn is_stale_at(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(interval) {
            Ok(interval) => now - self.refreshed_at > interval,
            Err(_) => false,
        }
    }
}

/// Latest collection result shared between the refresh loop and request
/// handlers. Writers swap the whole entry, readers clone the `Arc`.
#[derive(Debug, Default)]
pub struct ResultCache {
    entry: RwLock<Option<CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<Arc<AggregateResult>> {
        self.entry
            .read()
            .await
            .as_ref()
            .map(|entry| Arc::clone(&entry.result))
    }

    pub async fn snapshot(&self) -> Option<CacheEntry> {
        self.entry.read().await.clone()
    }

    pub async fn set(&self, result: AggregateResult) {
        self.set_at(result, Utc::now()).await;
    }

    pub async fn set_at(&self, result: AggregateResult, refreshed_at: DateTime<Utc>) {
        let entry = CacheEntry {
            result: Arc::new(result),
            refreshed_at,
        };
        *self.entry.write().await = Some(entry);
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.entry.read().await.as_ref().map(|entry| entry.refreshed_at)
    }

    pub async fn is_stale(&self, interval: Duration) -> bool {
        self.is_stale_at(interval, Utc::now()).await
    }

    /// Empty, or older than `interval` at `now`.
    pub async fn is_stale_at(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        match self.entry.read().await.as_ref() {
            Some(entry) => entry.is_stale_at(interval, now),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::OrgUsage;

    fn result_with(total: u64) -> AggregateResult {
        AggregateResult {
            organizations: vec![OrgUsage {
                name: "org-a".to_string(),
                app_instances: total,
                service_instances: 0,
                billable_service_instances: 0,
            }],
            total_app_instances: total,
            total_billable_app_instances: total,
            ..AggregateResult::default()
        }
    }

    #[tokio::test]
    async fn empty_cache_is_stale() {
        let cache = ResultCache::new();
        assert!(cache.get().await.is_none());
        assert!(cache.last_refresh().await.is_none());
        assert!(cache.is_stale(Duration::from_secs(3600)).await);
    }

    #[tokio::test]
    async fn staleness_follows_refresh_age() {
        let cache = ResultCache::new();
        let refreshed_at = Utc::now();
        cache.set_at(result_with(3), refreshed_at).await;

        let interval = Duration::from_secs(60);
        assert!(
            !cache
                .is_stale_at(interval, refreshed_at + chrono::Duration::seconds(30))
                .await
        );
        assert!(
            cache
                .is_stale_at(interval, refreshed_at + chrono::Duration::seconds(61))
                .await
        );
    }

    #[tokio::test]
    async fn snapshot_staleness_ignores_later_writes() {
        let cache = ResultCache::new();
        let old = Utc::now() - chrono::Duration::hours(2);
        cache.set_at(result_with(1), old).await;
        let served = cache.snapshot().await.expect("populated");

        cache.set(result_with(2)).await;

        let interval = Duration::from_secs(3600);
        assert!(served.is_stale_at(interval, Utc::now()));
        assert!(!cache.is_stale(interval).await);
    }

    #[tokio::test]
    async fn set_replaces_previous_result() {
        let cache = ResultCache::new();
        cache.set(result_with(1)).await;
        let before = cache.get().await.expect("populated");
        cache.set(result_with(2)).await;
        let after = cache.get().await.expect("populated");

        assert_eq!(before.total_app_instances, 1);
        assert_eq!(after.total_app_instances, 2);
    }
}
