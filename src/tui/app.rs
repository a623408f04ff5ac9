//! Application state for the watch view.

use std::collections::HashMap;

use crate::cache::{CacheKey, CachedValue, MarketCache};
use crate::models::Symbol;
use crate::models::ticker::{Change, TickerSnapshot};
use crate::websocket::{ConnectionState, FrameStatsSnapshot};

/// Placeholder for values that are not known yet.
pub const PLACEHOLDER: &str = "—";

/// Everything the watch view renders, copied out of the cache each frame.
#[derive(Debug)]
pub struct App {
    pub markets: Vec<Symbol>,
    pub tickers: HashMap<Symbol, TickerSnapshot>,
    pub rsi: HashMap<Symbol, Option<f64>>,
    pub period: u32,
    pub connection: ConnectionState,
    pub visible: bool,
    pub frames: FrameStatsSnapshot,
    pub should_quit: bool,
}

impl App {
    pub fn new(markets: Vec<Symbol>, period: u32) -> Self {
        Self {
            markets,
            tickers: HashMap::new(),
            rsi: HashMap::new(),
            period,
            connection: ConnectionState::Idle,
            visible: true,
            frames: FrameStatsSnapshot::default(),
            should_quit: false,
        }
    }

    /// Copies the current ticker and indicator entries out of the cache.
    ///
    /// Missing entries leave the previous values in place.
    pub fn refresh(&mut self, cache: &MarketCache, ticker_key: &CacheKey, indicator_key: &CacheKey) {
        if let Some(CachedValue::Tickers(tickers)) = cache.get(ticker_key) {
            self.tickers = tickers
                .into_iter()
                .map(|ticker| (ticker.market.clone(), ticker))
                .collect();
        }
        if let Some(CachedValue::Indicators(results)) = cache.get(indicator_key) {
            self.rsi = results
                .into_iter()
                .map(|result| (result.symbol, result.value))
                .collect();
        }
    }

    /// `live` only while the stream is open.
    pub fn is_live(&self) -> bool {
        self.connection == ConnectionState::Open
    }

    pub fn price_label(&self, market: &str) -> String {
        self.tickers
            .get(market)
            .map(|t| format_price(t.trade_price))
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    pub fn change_label(&self, market: &str) -> String {
        self.tickers
            .get(market)
            .map(|t| format!("{:+.2}%", t.signed_change_rate * 100.0))
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    pub fn change(&self, market: &str) -> Option<Change> {
        self.tickers.get(market).map(|t| t.change)
    }

    pub fn rsi_label(&self, market: &str) -> String {
        match self.rsi.get(market) {
            Some(Some(value)) => format!("{value:.1}"),
            _ => PLACEHOLDER.to_string(),
        }
    }
}

/// Formats a KRW price with thousands separators; sub-100 prices keep decimals.
pub fn format_price(price: f64) -> String {
    if price < 100.0 {
        return format!("{price:.2}");
    }
    let whole = format!("{:.0}", price);
    let digits = whole.trim_start_matches('-');
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use crate::indicator::MinuteUnit;
    use crate::models::indicator::IndicatorResult;

    fn ticker(market: &str, price: f64) -> TickerSnapshot {
        TickerSnapshot {
            market: market.to_string(),
            trade_price: price,
            signed_change_price: 0.0,
            signed_change_rate: -0.0125,
            acc_trade_price_24h: 0.0,
            acc_trade_volume_24h: 0.0,
            high_price: price,
            low_price: price,
            opening_price: price,
            prev_closing_price: price,
            change: Change::Fall,
            timestamp: 0,
        }
    }

    #[test]
    fn unknown_values_show_placeholder() {
        let app = App::new(vec!["KRW-BTC".to_string()], 14);
        assert_eq!(app.price_label("KRW-BTC"), PLACEHOLDER);
        assert_eq!(app.change_label("KRW-BTC"), PLACEHOLDER);
        assert_eq!(app.rsi_label("KRW-BTC"), PLACEHOLDER);
        assert!(!app.is_live());
    }

    #[test]
    fn refresh_reads_cache_entries() {
        let markets = vec!["KRW-BTC".to_string(), "KRW-ETH".to_string()];
        let cache = MarketCache::new(CachePolicy::default());
        let ticker_key = CacheKey::ticker(&markets);
        let indicator_key = CacheKey::indicator(&markets, 14, MinuteUnit::DEFAULT);
        cache.replace(
            ticker_key.clone(),
            CachedValue::Tickers(vec![ticker("KRW-BTC", 91_234_567.0)]),
        );
        cache.replace(
            indicator_key.clone(),
            CachedValue::Indicators(vec![
                IndicatorResult {
                    symbol: "KRW-BTC".to_string(),
                    value: Some(63.2),
                },
                IndicatorResult::absent("KRW-ETH"),
            ]),
        );

        let mut app = App::new(markets, 14);
        app.refresh(&cache, &ticker_key, &indicator_key);

        assert_eq!(app.price_label("KRW-BTC"), "91,234,567");
        assert_eq!(app.change_label("KRW-BTC"), "-1.25%");
        assert_eq!(app.rsi_label("KRW-BTC"), "63.2");
        assert_eq!(app.price_label("KRW-ETH"), PLACEHOLDER);
        assert_eq!(app.rsi_label("KRW-ETH"), PLACEHOLDER);
    }

    #[test]
    fn formats_prices() {
        assert_eq!(format_price(1_000.0), "1,000");
        assert_eq!(format_price(123_456_789.0), "123,456,789");
        assert_eq!(format_price(512.0), "512");
        assert_eq!(format_price(0.5), "0.50");
    }
}
