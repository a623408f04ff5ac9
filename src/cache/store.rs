//! The keyed market cache and its merge/replace contract.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{CacheKey, CachePolicy, CachedValue, Category};
use crate::{PulseError, Result};
use crate::models::ticker::{TickerSnapshot, TickerStreamMessage};

/// Entries kept per category before the oldest are evicted.
pub const MAX_ENTRIES_PER_CATEGORY: usize = 256;

/// Result shared by every caller awaiting one fetch.
pub type SharedResult = std::result::Result<CachedValue, Arc<PulseError>>;

type SharedFetch = Shared<BoxFuture<'static, SharedResult>>;

#[derive(Debug)]
struct Entry {
    value: CachedValue,
    updated_at: Instant,
}

/// A fetch in flight, awaited by every caller asking for the same key.
struct Inflight {
    id: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, Entry>,
    inflight: HashMap<CacheKey, Inflight>,
    next_fetch_id: u64,
}

impl Inner {
    fn insert(&mut self, key: CacheKey, value: CachedValue) {
        let category = key.category();
        self.entries.insert(
            key,
            Entry {
                value,
                updated_at: Instant::now(),
            },
        );
        self.evict_oldest(category);
    }

    fn evict_oldest(&mut self, category: Category) {
        let mut in_category: Vec<(Instant, CacheKey)> = self
            .entries
            .iter()
            .filter(|(key, _)| key.category() == category)
            .map(|(key, entry)| (entry.updated_at, key.clone()))
            .collect();
        let excess = in_category.len().saturating_sub(MAX_ENTRIES_PER_CATEGORY);
        if excess == 0 {
            return;
        }
        in_category.sort_by_key(|(updated_at, _)| *updated_at);
        for (_, key) in in_category.into_iter().take(excess) {
            debug!(?key, "Evicting cache entry");
            self.entries.remove(&key);
        }
    }
}

/// Removes an in-flight fetch once its last awaiter is gone, so an
/// abandoned fetch is never joined or written back later.
struct InflightGuard {
    cache: MarketCache,
    key: CacheKey,
    id: u64,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let mut inner = self.cache.lock();
        let abandoned = inner.inflight.get(&self.key).is_some_and(|inflight| {
            inflight.id == self.id && inflight.fetch.strong_count() == Some(1)
        });
        if abandoned {
            debug!(key = ?self.key, "Dropping abandoned fetch");
            inner.inflight.remove(&self.key);
        }
    }
}

/// Single source of truth for market snapshots.
///
/// Cloning is cheap; clones share the same entries. Each category holds at
/// most [`MAX_ENTRIES_PER_CATEGORY`] entries; the least recently written
/// are evicted first.
#[derive(Clone)]
pub struct MarketCache {
    inner: Arc<Mutex<Inner>>,
    policy: Arc<CachePolicy>,
    revision: Arc<watch::Sender<u64>>,
}

impl MarketCache {
    pub fn new(policy: CachePolicy) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            policy: Arc::new(policy),
            revision: Arc::new(revision),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// Receiver whose value changes after every mutation.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Returns the cached value for `key`, fresh or stale.
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        self.lock().entries.get(key).map(|entry| entry.value.clone())
    }

    /// Returns `true` if `key` holds a value younger than its category's window.
    pub fn is_fresh(&self, key: &CacheKey) -> bool {
        let stale_after = self.policy.for_category(key.category()).stale_after;
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.updated_at.elapsed() < stale_after)
    }

    /// Replaces the entry for `key` wholesale.
    pub fn replace(&self, key: CacheKey, value: CachedValue) {
        self.lock().insert(key, value);
        self.bump();
    }

    /// Applies a streamed ticker update to every cached ticker list that
    /// already contains its market.
    ///
    /// Only the fields the stream carries are overwritten. Markets with
    /// no cached snapshot are left absent. Returns the number of
    /// snapshots patched.
    pub fn merge_ticker(&self, update: &TickerStreamMessage) -> usize {
        let mut patched = 0;
        {
            let mut inner = self.lock();
            for (key, entry) in inner.entries.iter_mut() {
                let (CacheKey::Ticker(markets), CachedValue::Tickers(tickers)) =
                    (key, &mut entry.value)
                else {
                    continue;
                };
                if !markets.contains(&update.code) {
                    continue;
                }
                for ticker in tickers.iter_mut().filter(|t| t.market == update.code) {
                    ticker.apply(update);
                    patched += 1;
                }
            }
        }

        if patched > 0 {
            self.bump();
        } else {
            debug!(market = update.code, "No cached ticker to merge into");
        }
        patched
    }

    /// Returns the tickers cached for exactly this market list.
    pub fn tickers(&self, key: &CacheKey) -> Option<Vec<TickerSnapshot>> {
        match self.get(key)? {
            CachedValue::Tickers(tickers) => Some(tickers),
            _ => None,
        }
    }

    /// Drops every entry in `category`.
    ///
    /// Fetches in flight for the category are detached: current awaiters
    /// still get their result, but it is not written back and later
    /// requests start a new fetch.
    pub fn invalidate(&self, category: Category) {
        {
            let mut inner = self.lock();
            inner.entries.retain(|key, _| key.category() != category);
            inner.inflight.retain(|key, _| key.category() != category);
        }
        self.bump();
    }

    /// Drops every entry and detaches every fetch in flight.
    pub fn invalidate_all(&self) {
        {
            let mut inner = self.lock();
            inner.entries.clear();
            inner.inflight.clear();
        }
        self.bump();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Number of entries currently held for `category`.
    pub fn category_len(&self, category: Category) -> usize {
        self.lock()
            .entries
            .keys()
            .filter(|key| key.category() == category)
            .count()
    }

    /// Returns a fresh cached value, or fetches one.
    ///
    /// See [`MarketCache::refresh`] for de-duplication and failure handling.
    pub async fn fetch<F, Fut>(&self, key: CacheKey, fetcher: F) -> Option<CachedValue>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedValue>> + Send + 'static,
    {
        if self.is_fresh(&key) {
            return self.get(&key);
        }
        self.refresh(key, fetcher).await
    }

    /// Like [`MarketCache::fetch`], but a failed fetch with nothing cached
    /// returns the fetch error instead of `None`.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error when no value, fresh or stale, is cached.
    pub async fn try_fetch<F, Fut>(&self, key: CacheKey, fetcher: F) -> SharedResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedValue>> + Send + 'static,
    {
        if self.is_fresh(&key)
            && let Some(value) = self.get(&key)
        {
            return Ok(value);
        }
        match self.load(key.clone(), fetcher).await {
            Ok(value) => Ok(value),
            Err(e) => self.get(&key).ok_or(e),
        }
    }

    /// Fetches a new value for `key` regardless of freshness.
    ///
    /// If a fetch for the same key is already in flight, this awaits that
    /// fetch instead of starting another; `fetcher` is then not called.
    /// On success the entry is replaced wholesale. On failure the stale
    /// entry stays in place and is returned.
    ///
    /// Dropping the returned future abandons the fetch once no other
    /// caller awaits it.
    ///
    /// `fetcher` runs while the cache is locked and must only build the
    /// future, not touch the cache.
    pub async fn refresh<F, Fut>(&self, key: CacheKey, fetcher: F) -> Option<CachedValue>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedValue>> + Send + 'static,
    {
        match self.load(key.clone(), fetcher).await {
            Ok(value) => Some(value),
            Err(_) => self.get(&key),
        }
    }

    async fn load<F, Fut>(&self, key: CacheKey, fetcher: F) -> SharedResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedValue>> + Send + 'static,
    {
        // The guard is declared first so it drops after `fetch`.
        let _guard;
        let fetch = {
            let mut inner = self.lock();
            let (id, fetch) = match inner.inflight.get(&key) {
                Some(existing) => {
                    debug!(?key, "Joining in-flight fetch");
                    (existing.id, existing.fetch.clone())
                }
                None => {
                    let id = inner.next_fetch_id;
                    inner.next_fetch_id = id.wrapping_add(1);
                    let request = fetcher();
                    let cache = self.clone();
                    let task_key = key.clone();
                    let fetch = async move {
                        let result = request.await;
                        cache.complete(task_key, id, result)
                    }
                    .boxed()
                    .shared();
                    inner.inflight.insert(
                        key.clone(),
                        Inflight {
                            id,
                            fetch: fetch.clone(),
                        },
                    );
                    (id, fetch)
                }
            };
            _guard = InflightGuard {
                cache: self.clone(),
                key,
                id,
            };
            fetch
        };
        fetch.await
    }

    /// Writes a finished fetch back, unless it was detached by invalidation.
    fn complete(&self, key: CacheKey, id: u64, result: Result<CachedValue>) -> SharedResult {
        let mut inner = self.lock();
        let current = inner
            .inflight
            .get(&key)
            .is_some_and(|inflight| inflight.id == id);
        if current {
            inner.inflight.remove(&key);
        }

        match result {
            Ok(value) if current => {
                inner.insert(key, value.clone());
                drop(inner);
                self.bump();
                Ok(value)
            }
            Ok(value) => {
                debug!(?key, "Discarding result of detached fetch");
                Ok(value)
            }
            Err(e) => {
                warn!(?key, error = %e, "Refresh failed, keeping stale value");
                Err(Arc::new(e))
            }
        }
    }
}
