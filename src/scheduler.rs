use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use crate::cache::ResultCache;
use crate::usage::UsageSource;

/// Starts the background refresh loop. The first collection runs right away,
/// later ones every `interval` until `shutdown` flips or its sender drops.
pub fn spawn(
    source: Arc<dyn UsageSource>,
    cache: Arc<ResultCache>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run(source, cache, interval, shutdown))
}

pub async fn run(
    source: Arc<dyn UsageSource>,
    cache: Arc<ResultCache>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(interval);
    // a slow run delays the next tick instead of queueing catch-up ticks
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(?interval, "starting usage refresh loop");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                process_tick(source.as_ref(), &cache).await;
            }
        }
    }
    info!("stopping usage refresh loop");
}

/// Runs one collection and publishes it. A failed run leaves the cache as it
/// was. Returns whether a new result was published.
pub async fn process_tick(source: &dyn UsageSource, cache: &ResultCache) -> bool {
    info!("refreshing usage data");
    match source.collect_usage().await {
        Ok(result) => {
            cache.set(result).await;
            info!("usage data refreshed");
            true
        }
        Err(err) => {
            error!(%err, "usage data refresh failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CfError, CfResult};
    use crate::usage::AggregateResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingSource {
        calls: AtomicU64,
        fail: bool,
    }

    #[async_trait]
    impl UsageSource for CountingSource {
        async fn collect_usage(&self) -> CfResult<AggregateResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(CfError::Config("upstream down".to_string()));
            }
            Ok(AggregateResult {
                total_app_instances: call,
                total_billable_app_instances: call,
                ..AggregateResult::default()
            })
        }
    }

    #[tokio::test]
    async fn failed_tick_keeps_previous_result() {
        let cache = ResultCache::new();
        let ok = CountingSource {
            calls: AtomicU64::new(0),
            fail: false,
        };
        assert!(process_tick(&ok, &cache).await);

        let failing = CountingSource {
            calls: AtomicU64::new(0),
            fail: true,
        };
        assert!(!process_tick(&failing, &cache).await);
        assert_eq!(cache.get().await.expect("kept").total_app_instances, 1);
    }

    #[tokio::test]
    async fn failed_tick_leaves_empty_cache_empty() {
        let cache = ResultCache::new();
        let failing = CountingSource {
            calls: AtomicU64::new(0),
            fail: true,
        };
        assert!(!process_tick(&failing, &cache).await);
        assert!(cache.get().await.is_none());
    }
}
