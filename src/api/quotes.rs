//! Quotation routes.
//!
//! - `GET /ticker?markets=KRW-BTC,KRW-ETH` - pass-through
//! - `GET /candles?market=KRW-BTC&unit=15&count=200` - cached per market, unit and count
//! - `GET /markets` - cached market list
//!
//! Cached routes still relay the upstream status when nothing is cached.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use super::{ApiError, AppState};
use crate::cache::{CacheKey, CachedValue};
use crate::indicator::MinuteUnit;
use crate::models::Symbol;
use crate::models::candle::CandleSample;
use crate::models::market::{MarketInfo, is_krw_market_code};
use crate::models::ticker::TickerSnapshot;
use crate::{PulseError, Result};

/// Upper bound on markets per ticker request.
pub const MAX_TICKER_MARKETS: usize = 100;

/// Upper bound (and default) on candles per request.
pub const MAX_CANDLES: u32 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct TickerQuery {
    pub markets: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandleQuery {
    pub market: Option<String>,
    pub unit: Option<String>,
    pub count: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ticker", get(get_ticker))
        .route("/candles", get(get_candles))
        .route("/markets", get(get_markets))
}

async fn get_ticker(
    State(state): State<AppState>,
    Query(params): Query<TickerQuery>,
) -> std::result::Result<Json<Vec<TickerSnapshot>>, ApiError> {
    let markets = parse_ticker_markets(params.markets.as_deref())?;
    debug!(count = markets.len(), "Ticker pass-through");
    Ok(Json(state.rest.tickers(&markets).await?))
}

async fn get_candles(
    State(state): State<AppState>,
    Query(params): Query<CandleQuery>,
) -> std::result::Result<Json<Vec<CandleSample>>, ApiError> {
    let (market, unit, count) = parse_candle_query(&params)?;
    debug!(market, unit = unit.minutes(), count, "Candle request");

    let key = CacheKey::Candles {
        market: market.clone(),
        unit,
        count,
    };
    let rest = state.rest.clone();
    let value = state
        .cache
        .try_fetch(key, move || async move {
            Ok(CachedValue::Candles(rest.candles(&market, unit, count).await?))
        })
        .await?;

    match value {
        CachedValue::Candles(candles) => Ok(Json(candles)),
        _ => Err(unexpected()),
    }
}

async fn get_markets(
    State(state): State<AppState>,
) -> std::result::Result<Json<Vec<MarketInfo>>, ApiError> {
    let rest = state.rest.clone();
    let value = state
        .cache
        .try_fetch(CacheKey::Markets, move || async move {
            Ok(CachedValue::Markets(rest.krw_markets().await?))
        })
        .await?;

    match value {
        CachedValue::Markets(markets) => Ok(Json(markets)),
        _ => Err(unexpected()),
    }
}

fn unexpected() -> ApiError {
    ApiError(PulseError::Io(
        "cache held an unexpected value for this route".to_string(),
    ))
}

/// Splits and validates a comma-separated KRW market list.
///
/// # Errors
///
/// Returns [`PulseError::Validation`] if the list is missing or empty,
/// longer than [`MAX_TICKER_MARKETS`], or contains a non-KRW code.
pub fn parse_ticker_markets(raw: Option<&str>) -> Result<Vec<Symbol>> {
    let raw = raw.ok_or_else(|| PulseError::Validation("markets parameter is required".into()))?;
    let markets: Vec<Symbol> = raw
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect();

    if markets.is_empty() {
        return Err(PulseError::Validation("markets parameter is required".into()));
    }
    if markets.len() > MAX_TICKER_MARKETS {
        return Err(PulseError::Validation(format!(
            "at most {MAX_TICKER_MARKETS} markets per request"
        )));
    }
    if let Some(bad) = markets.iter().find(|m| !is_krw_market_code(m)) {
        return Err(PulseError::Validation(format!(
            "invalid market code {bad:?}, expected KRW-XXX"
        )));
    }

    Ok(markets)
}

/// Validates candle query parameters, clamping `count` to [`MAX_CANDLES`].
///
/// # Errors
///
/// Returns [`PulseError::Validation`] if `market` is missing or invalid,
/// `unit` is not a valid minute granularity, or `count` is not a positive
/// integer.
pub fn parse_candle_query(params: &CandleQuery) -> Result<(Symbol, MinuteUnit, u32)> {
    let market = params
        .market
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| PulseError::Validation("market parameter is required".into()))?;
    if !is_krw_market_code(market) {
        return Err(PulseError::Validation(format!(
            "invalid market code {market:?}, expected KRW-XXX"
        )));
    }

    let unit = match params.unit.as_deref() {
        Some(raw) => {
            let minutes = raw.trim().parse::<u32>().map_err(|_| {
                PulseError::Validation(format!("unit must be an integer, got {raw:?}"))
            })?;
            MinuteUnit::try_from(minutes)?
        }
        None => MinuteUnit::DEFAULT,
    };

    let count = match params.count.as_deref() {
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(n) if n >= 1 => n.min(MAX_CANDLES),
            _ => {
                return Err(PulseError::Validation(format!(
                    "count must be a positive integer, got {raw:?}"
                )));
            }
        },
        None => MAX_CANDLES,
    };

    Ok((market.to_string(), unit, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle_query(market: &str, unit: Option<&str>, count: Option<&str>) -> CandleQuery {
        CandleQuery {
            market: Some(market.to_string()),
            unit: unit.map(String::from),
            count: count.map(String::from),
        }
    }

    #[test]
    fn ticker_markets_are_trimmed() {
        let markets = parse_ticker_markets(Some(" KRW-BTC, KRW-ETH ,")).unwrap();
        assert_eq!(markets, vec!["KRW-BTC", "KRW-ETH"]);
    }

    #[test]
    fn ticker_rejects_foreign_and_oversized_lists() {
        assert!(parse_ticker_markets(None).unwrap_err().is_validation());
        assert!(parse_ticker_markets(Some("BTC-ETH")).unwrap_err().is_validation());

        let many: Vec<String> = (0..=MAX_TICKER_MARKETS).map(|i| format!("KRW-A{i}")).collect();
        assert!(parse_ticker_markets(Some(&many.join(","))).is_err());
    }

    #[test]
    fn candle_defaults_and_clamp() {
        let (market, unit, count) = parse_candle_query(&candle_query("KRW-BTC", None, None)).unwrap();
        assert_eq!(market, "KRW-BTC");
        assert_eq!(unit, MinuteUnit::DEFAULT);
        assert_eq!(count, MAX_CANDLES);

        let (_, unit, count) =
            parse_candle_query(&candle_query("KRW-BTC", Some("60"), Some("500"))).unwrap();
        assert_eq!(unit.minutes(), 60);
        assert_eq!(count, 200);
    }

    #[test]
    fn candle_rejects_bad_values() {
        assert!(parse_candle_query(&candle_query("KRW-BTC", Some("7"), None)).is_err());
        assert!(parse_candle_query(&candle_query("KRW-BTC", None, Some("0"))).is_err());
        assert!(parse_candle_query(&candle_query("KRW-BTC", None, Some("ten"))).is_err());
        assert!(parse_candle_query(&CandleQuery::default()).is_err());
    }
}
