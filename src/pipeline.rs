//! Owned wiring of the market data pipeline.
//!
//! [`MarketPipeline`] builds the REST client, the cache, the streaming
//! client and the background pollers for one set of watched markets, and
//! tears all of them down again on [`MarketPipeline::shutdown`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::Result;
use crate::cache::{CacheKey, CachedValue, Category, MarketCache, spawn_poller};
use crate::config::AppConfig;
use crate::indicator::{DEFAULT_PERIOD, IndicatorBatchService, MinuteUnit};
use crate::models::Symbol;
use crate::rest::RestClient;
use crate::shutdown::ShutdownTrigger;
use crate::tls::shared_tls_config;
use crate::websocket::{StreamClient, StreamSubscription};

/// Pollers tied to the current market list.
struct MarketPollers {
    trigger: ShutdownTrigger,
    handles: Vec<JoinHandle<()>>,
}

impl MarketPollers {
    async fn stop(self) {
        self.trigger.trigger();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Poller task failed");
            }
        }
    }
}

/// Cache, stream and pollers for a watched market list.
pub struct MarketPipeline {
    rest: RestClient,
    cache: MarketCache,
    indicators: Arc<IndicatorBatchService<RestClient>>,
    stream: StreamClient,
    subscription: StreamSubscription,
    markets: Vec<Symbol>,
    period: u32,
    unit: MinuteUnit,
    pollers: Option<MarketPollers>,
}

impl MarketPipeline {
    /// Starts streaming and polling `markets` with the default RSI settings.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Tls`](crate::PulseError::Tls) if the TLS or
    /// HTTP client cannot be built.
    pub fn start(config: &AppConfig, markets: Vec<Symbol>) -> Result<Self> {
        let tls_config = shared_tls_config()?;
        let rest = RestClient::new(&config.upbit.rest_url, tls_config.clone())?;
        let cache = MarketCache::new(config.cache.clone());
        let indicators = Arc::new(IndicatorBatchService::new(rest.clone(), config.batch.clone()));
        let stream = StreamClient::spawn(&config.upbit.websocket_url, tls_config, cache.clone());

        Ok(Self::assemble(rest, cache, indicators, stream, markets))
    }

    /// Wires already constructed parts together and starts the pollers.
    pub fn assemble(
        rest: RestClient,
        cache: MarketCache,
        indicators: Arc<IndicatorBatchService<RestClient>>,
        stream: StreamClient,
        markets: Vec<Symbol>,
    ) -> Self {
        let subscription = stream.subscribe_tickers(&markets);
        let mut pipeline = Self {
            rest,
            cache,
            indicators,
            stream,
            subscription,
            markets,
            period: DEFAULT_PERIOD,
            unit: MinuteUnit::DEFAULT,
            pollers: None,
        };
        pipeline.pollers = Some(pipeline.spawn_market_pollers());
        info!(markets = ?pipeline.markets, "Market pipeline started");
        pipeline
    }

    pub fn cache(&self) -> &MarketCache {
        &self.cache
    }

    pub fn stream(&self) -> &StreamClient {
        &self.stream
    }

    pub fn subscription(&self) -> &StreamSubscription {
        &self.subscription
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn indicators(&self) -> &Arc<IndicatorBatchService<RestClient>> {
        &self.indicators
    }

    pub fn markets(&self) -> &[Symbol] {
        &self.markets
    }

    pub fn ticker_key(&self) -> CacheKey {
        CacheKey::ticker(&self.markets)
    }

    pub fn indicator_key(&self) -> CacheKey {
        CacheKey::indicator(&self.markets, self.period, self.unit)
    }

    /// Switches to a new market list.
    ///
    /// Ticker and indicator entries are invalidated, pollers restarted and
    /// the stream re-announced for the new list.
    pub async fn set_markets(&mut self, markets: Vec<Symbol>) {
        if markets == self.markets {
            return;
        }
        if let Some(pollers) = self.pollers.take() {
            pollers.stop().await;
        }
        self.cache.invalidate(Category::Ticker);
        self.cache.invalidate(Category::Indicator);

        self.markets = markets;
        self.subscription = self.stream.subscribe_tickers(&self.markets);
        self.pollers = Some(self.spawn_market_pollers());
        info!(markets = ?self.markets, "Market list changed");
    }

    fn spawn_market_pollers(&self) -> MarketPollers {
        let (trigger, shutdown) = ShutdownTrigger::channel();
        let mut handles = Vec::new();
        let policy = self.cache.policy();

        if self.markets.is_empty() {
            return MarketPollers { trigger, handles };
        }

        if let Some(every) = policy.ticker.refetch_every {
            let rest = self.rest.clone();
            let markets = self.markets.clone();
            handles.push(spawn_poller(
                self.cache.clone(),
                self.ticker_key(),
                every,
                move || {
                    let rest = rest.clone();
                    let markets = markets.clone();
                    async move { Ok(CachedValue::Tickers(rest.tickers(&markets).await?)) }
                },
                shutdown.clone(),
            ));
        }

        if let Some(every) = policy.indicator.refetch_every {
            let indicators = self.indicators.clone();
            let markets = self.markets.clone();
            let (period, unit) = (self.period, self.unit);
            handles.push(spawn_poller(
                self.cache.clone(),
                self.indicator_key(),
                every,
                move || {
                    let indicators = indicators.clone();
                    let markets = markets.clone();
                    async move {
                        let results = indicators.compute_batch(&markets, period, unit).await?;
                        Ok(CachedValue::Indicators(results))
                    }
                },
                shutdown,
            ));
        }

        MarketPollers { trigger, handles }
    }

    /// Stops the pollers, closes the stream and cancels its timers.
    pub async fn shutdown(mut self) {
        if let Some(pollers) = self.pollers.take() {
            pollers.stop().await;
        }
        self.stream.shutdown().await;
        info!("Market pipeline stopped");
    }
}
