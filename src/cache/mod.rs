//! Shared cache of last-known-good market snapshots.
//!
//! Two independent sources feed it: scheduled polls, which replace an
//! entry wholesale, and streamed ticker updates, which patch fields of
//! entries that already exist. Consumers only ever read from here.
//!
//! - [`policy`] - per-category freshness and poll intervals
//! - [`store`] - the [`MarketCache`] itself
//! - [`poller`] - background refresh tasks

pub mod policy;
pub mod poller;
pub mod store;

use crate::indicator::MinuteUnit;
use crate::models::Symbol;
use crate::models::balance::Balance;
use crate::models::candle::CandleSample;
use crate::models::indicator::IndicatorResult;
use crate::models::market::MarketInfo;
use crate::models::orders::{Order, OrderFilter};
use crate::models::ticker::TickerSnapshot;

pub use policy::{CachePolicy, CategoryPolicy};
pub use poller::spawn_poller;
pub use store::MarketCache;

/// Cache categories, each with its own [`CategoryPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Ticker,
    Indicator,
    Candles,
    Balances,
    Orders,
    Markets,
}

/// Identity of one cache entry; also the de-duplication key for fetches.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Tickers for a sorted, de-duplicated market list.
    Ticker(Vec<Symbol>),
    /// RSI for a sorted market list at a given period and unit.
    Indicator {
        symbols: Vec<Symbol>,
        period: u32,
        unit: MinuteUnit,
    },
    Candles {
        market: Symbol,
        unit: MinuteUnit,
        count: u32,
    },
    Balances,
    Orders(OrderFilter),
    Markets,
}

impl CacheKey {
    /// Ticker key for `markets`; the order of `markets` does not matter.
    pub fn ticker<I>(markets: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        CacheKey::Ticker(sorted(markets))
    }

    /// Indicator key for `markets`; the order of `markets` does not matter.
    pub fn indicator<I>(markets: I, period: u32, unit: MinuteUnit) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        CacheKey::Indicator {
            symbols: sorted(markets),
            period,
            unit,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            CacheKey::Ticker(_) => Category::Ticker,
            CacheKey::Indicator { .. } => Category::Indicator,
            CacheKey::Candles { .. } => Category::Candles,
            CacheKey::Balances => Category::Balances,
            CacheKey::Orders(_) => Category::Orders,
            CacheKey::Markets => Category::Markets,
        }
    }
}

fn sorted<I>(markets: I) -> Vec<Symbol>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<Symbol> = markets
        .into_iter()
        .map(|m| m.as_ref().trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// A complete cached snapshot for one key.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedValue {
    Tickers(Vec<TickerSnapshot>),
    Indicators(Vec<IndicatorResult>),
    Candles(Vec<CandleSample>),
    Balances(Vec<Balance>),
    Orders(Vec<Order>),
    Markets(Vec<MarketInfo>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_key_ignores_order_and_repeats() {
        assert_eq!(
            CacheKey::ticker(["KRW-ETH", "KRW-BTC", "KRW-ETH"]),
            CacheKey::ticker(["KRW-BTC", "KRW-ETH"])
        );
    }

    #[test]
    fn categories_are_distinct_per_key() {
        assert_eq!(CacheKey::ticker(["KRW-BTC"]).category(), Category::Ticker);
        assert_eq!(
            CacheKey::indicator(["KRW-BTC"], 14, MinuteUnit::DEFAULT).category(),
            Category::Indicator
        );
        assert_eq!(
            CacheKey::Orders(OrderFilter::default()).category(),
            Category::Orders
        );
    }
}
