//! Background refresh tasks that replace cache entries on a schedule.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use super::{CacheKey, CachedValue, MarketCache};
use crate::Result;
use crate::shutdown::Shutdown;

/// Spawns a task that refreshes `key` every `every` until `shutdown` fires.
///
/// The first refresh runs immediately. Refreshes go through
/// [`MarketCache::refresh`], so a poll that coincides with an on-demand
/// fetch of the same key shares its request. A failed poll keeps the
/// previous value and the next tick tries again.
pub fn spawn_poller<F, Fut>(
    cache: MarketCache,
    key: CacheKey,
    every: Duration,
    fetcher: F,
    mut shutdown: Shutdown,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CachedValue>> + Send + 'static,
{
    tokio::spawn(async move {
        info!(?key, every_ms = every.as_millis() as u64, "Poller started");
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = shutdown.wait() => break,
                value = cache.refresh(key.clone(), &fetcher) => {
                    debug!(?key, refreshed = value.is_some(), "Poll finished");
                }
            }
        }

        info!(?key, "Poller stopped");
    })
}
