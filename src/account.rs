//! Authenticated balance/order read-store, as seen by the cache.
//!
//! The store itself lives outside this crate and owns signing. Its results
//! only ever enter the cache through wholesale polls.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::Result;
use crate::cache::{CacheKey, CachePolicy, CachedValue, MarketCache, spawn_poller};
use crate::models::balance::Balance;
use crate::models::orders::{Order, OrderFilter};
use crate::shutdown::Shutdown;

/// Read access to the account's balances and orders.
pub trait AccountStore: Send + Sync + 'static {
    fn balances(&self) -> impl Future<Output = Result<Vec<Balance>>> + Send;

    fn orders(&self, filter: &OrderFilter) -> impl Future<Output = Result<Vec<Order>>> + Send;
}

/// Starts pollers for balances and for each order filter.
///
/// Categories whose policy disables polling get no task.
pub fn spawn_account_pollers<S: AccountStore>(
    cache: &MarketCache,
    store: Arc<S>,
    filters: &[OrderFilter],
    policy: &CachePolicy,
    shutdown: &Shutdown,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    if let Some(every) = policy.balances.refetch_every {
        let store = store.clone();
        handles.push(spawn_poller(
            cache.clone(),
            CacheKey::Balances,
            every,
            move || {
                let store = store.clone();
                async move { Ok(CachedValue::Balances(store.balances().await?)) }
            },
            shutdown.clone(),
        ));
    }

    if let Some(every) = policy.orders.refetch_every {
        for filter in filters {
            let store = store.clone();
            let query = filter.clone();
            handles.push(spawn_poller(
                cache.clone(),
                CacheKey::Orders(filter.clone()),
                every,
                move || {
                    let store = store.clone();
                    let query = query.clone();
                    async move { Ok(CachedValue::Orders(store.orders(&query).await?)) }
                },
                shutdown.clone(),
            ));
        }
    }

    handles
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::orders::OrderState;
    use crate::shutdown::ShutdownTrigger;

    #[derive(Default)]
    struct FakeStore {
        order_queries: Mutex<Vec<OrderFilter>>,
    }

    impl AccountStore for FakeStore {
        async fn balances(&self) -> Result<Vec<Balance>> {
            Ok(vec![Balance {
                currency: "KRW".to_string(),
                balance: dec!(1000000),
                locked: dec!(0),
                avg_buy_price: dec!(0),
                avg_buy_price_modified: false,
                unit_currency: "KRW".to_string(),
            }])
        }

        async fn orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
            self.order_queries.lock().unwrap().push(filter.clone());
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_balances_and_each_order_filter() {
        let cache = MarketCache::new(CachePolicy::default());
        let store = Arc::new(FakeStore::default());
        let (trigger, shutdown) = ShutdownTrigger::channel();
        let waiting = OrderFilter {
            state: Some(OrderState::Wait),
            market: None,
        };

        let handles = spawn_account_pollers(
            &cache,
            store.clone(),
            &[waiting.clone()],
            &CachePolicy::default(),
            &shutdown,
        );
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(handles.len(), 2);
        match cache.get(&CacheKey::Balances) {
            Some(CachedValue::Balances(balances)) => assert_eq!(balances[0].total(), dec!(1000000)),
            other => panic!("unexpected cache value: {other:?}"),
        }
        assert_eq!(
            cache.get(&CacheKey::Orders(waiting.clone())),
            Some(CachedValue::Orders(Vec::new()))
        );
        assert_eq!(*store.order_queries.lock().unwrap(), vec![waiting]);

        trigger.trigger();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn disabled_polling_spawns_nothing() {
        let cache = MarketCache::new(CachePolicy::default());
        let (_trigger, shutdown) = ShutdownTrigger::channel();
        let mut policy = CachePolicy::default();
        policy.balances.refetch_every = None;
        policy.orders.refetch_every = None;

        let handles = spawn_account_pollers(
            &cache,
            Arc::new(FakeStore::default()),
            &[OrderFilter::default()],
            &policy,
            &shutdown,
        );

        assert!(handles.is_empty());
    }
}
