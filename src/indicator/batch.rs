//! Batched RSI computation over the exchange's candle history endpoint.
//!
//! Markets are fetched in fixed-size groups. Fetches inside a group run
//! concurrently; a fixed delay separates consecutive groups so the
//! upstream rate limit is not tripped. A failed fetch only affects its
//! own market, which resolves to an absent value.

use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::rsi::{round_one_decimal, wilder_rsi};
use crate::models::Symbol;
use crate::models::indicator::IndicatorResult;
use crate::{PulseError, Result};

/// Smallest accepted lookback period.
pub const MIN_PERIOD: u32 = 2;

/// Largest accepted lookback period.
pub const MAX_PERIOD: u32 = 50;

/// Lookback used when the caller does not pass one.
pub const DEFAULT_PERIOD: u32 = 14;

/// Extra samples requested beyond the lookback period.
const HISTORY_PADDING: u32 = 10;

/// Minute granularities offered by the candle endpoint.
pub const VALID_UNITS: [u32; 8] = [1, 3, 5, 10, 15, 30, 60, 240];

/// Candle granularity in minutes, restricted to [`VALID_UNITS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MinuteUnit(u32);

impl MinuteUnit {
    pub const DEFAULT: MinuteUnit = MinuteUnit(15);

    pub fn minutes(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for MinuteUnit {
    type Error = PulseError;

    fn try_from(minutes: u32) -> Result<Self> {
        if VALID_UNITS.contains(&minutes) {
            Ok(MinuteUnit(minutes))
        } else {
            Err(PulseError::Validation(format!(
                "unit must be one of {VALID_UNITS:?}, got {minutes}"
            )))
        }
    }
}

/// Source of recent close prices for one market.
pub trait HistorySource: Send + Sync {
    /// Fetches up to `count` close prices, most recent first.
    ///
    /// Any error (transport, non-2xx, empty or malformed payload) marks
    /// only this market as absent.
    fn fetch_closes(
        &self,
        symbol: &str,
        unit: MinuteUnit,
        count: u32,
    ) -> impl Future<Output = Result<Vec<f64>>> + Send;
}

/// Group size and inter-group delay for upstream fetches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    pub group_size: usize,
    pub group_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: 3,
            group_delay: Duration::from_millis(400),
        }
    }
}

/// A validated indicator request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndicatorRequest {
    pub symbols: Vec<Symbol>,
    pub period: u32,
    pub unit: MinuteUnit,
}

impl IndicatorRequest {
    /// Parses raw query parameters.
    ///
    /// `markets` is a comma-separated list; `period` defaults to 14 and
    /// `unit` to 15 minutes.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Validation`] if `markets` is missing or blank,
    /// `period` is not an integer in `[2, 50]`, or `unit` is not a valid
    /// minute granularity.
    pub fn parse(markets: Option<&str>, period: Option<&str>, unit: Option<&str>) -> Result<Self> {
        let markets = markets.ok_or_else(|| {
            PulseError::Validation("markets parameter is required (e.g. KRW-BTC,KRW-ETH)".into())
        })?;
        let symbols = normalize_symbols(markets.split(','));

        let period = match period {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| period_error())?,
            None => DEFAULT_PERIOD,
        };

        let unit = match unit {
            Some(raw) => {
                let minutes = raw.trim().parse::<u32>().map_err(|_| {
                    PulseError::Validation(format!("unit must be an integer, got {raw:?}"))
                })?;
                MinuteUnit::try_from(minutes)?
            }
            None => MinuteUnit::DEFAULT,
        };

        validate(&symbols, period)?;

        Ok(Self {
            symbols,
            period,
            unit,
        })
    }
}

fn period_error() -> PulseError {
    PulseError::Validation(format!(
        "period must be an integer between {MIN_PERIOD} and {MAX_PERIOD}"
    ))
}

/// Trims symbols and drops blanks and repeats, keeping first-seen order.
fn normalize_symbols<I>(symbols: I) -> Vec<Symbol>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<Symbol> = Vec::new();
    for symbol in symbols {
        let symbol = symbol.as_ref().trim();
        if !symbol.is_empty() && !out.iter().any(|s| s == symbol) {
            out.push(symbol.to_string());
        }
    }
    out
}

fn validate(symbols: &[Symbol], period: u32) -> Result<()> {
    if !(MIN_PERIOD..=MAX_PERIOD).contains(&period) {
        return Err(period_error());
    }
    if symbols.is_empty() {
        return Err(PulseError::Validation(
            "markets must contain at least one market code".into(),
        ));
    }
    Ok(())
}

/// Computes RSI for many markets without exceeding the upstream rate limit.
pub struct IndicatorBatchService<S> {
    source: S,
    config: BatchConfig,
}

impl<S: HistorySource> IndicatorBatchService<S> {
    /// Creates a service; a zero group size is treated as one.
    pub fn new(source: S, mut config: BatchConfig) -> Self {
        config.group_size = config.group_size.max(1);
        Self { source, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Computes one [`IndicatorResult`] per distinct input symbol, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Validation`] before any upstream call if the
    /// period is outside `[2, 50]` or no symbol remains after trimming.
    /// Upstream failures never error; they yield absent values.
    pub async fn compute_batch(
        &self,
        symbols: &[Symbol],
        period: u32,
        unit: MinuteUnit,
    ) -> Result<Vec<IndicatorResult>> {
        let symbols = normalize_symbols(symbols);
        validate(&symbols, period)?;

        let count = period + HISTORY_PADDING;
        let mut results = Vec::with_capacity(symbols.len());

        for (index, group) in symbols.chunks(self.config.group_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.group_delay).await;
            }
            debug!(group = index, markets = ?group, "Fetching history group");

            let group_results =
                join_all(group.iter().map(|symbol| self.compute_one(symbol, period, unit, count)))
                    .await;
            results.extend(group_results);
        }

        info!(
            markets = results.len(),
            absent = results.iter().filter(|r| r.value.is_none()).count(),
            period,
            unit = unit.minutes(),
            "Computed RSI batch"
        );

        Ok(results)
    }

    async fn compute_one(
        &self,
        symbol: &str,
        period: u32,
        unit: MinuteUnit,
        count: u32,
    ) -> IndicatorResult {
        match self.source.fetch_closes(symbol, unit, count).await {
            Ok(mut closes) if !closes.is_empty() => {
                closes.reverse();
                let value = wilder_rsi(&closes, period as usize).map(round_one_decimal);
                if value.is_none() {
                    debug!(market = symbol, samples = closes.len(), "Insufficient history");
                }
                IndicatorResult {
                    symbol: symbol.to_string(),
                    value,
                }
            }
            Ok(_) => {
                warn!(market = symbol, "Empty candle history");
                IndicatorResult::absent(symbol)
            }
            Err(e) => {
                warn!(market = symbol, error = %e, "History fetch failed");
                IndicatorResult::absent(symbol)
            }
        }
    }
}
