//! `GET /indicators?markets=<list>&period=<2..50>&unit=<minutes>`

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use super::{ApiError, AppState};
use crate::PulseError;
use crate::cache::{CacheKey, CachedValue};
use crate::indicator::IndicatorRequest;
use crate::models::indicator::IndicatorResult;

#[derive(Debug, Default, Deserialize)]
pub struct IndicatorQuery {
    pub markets: Option<String>,
    pub period: Option<String>,
    pub unit: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/indicators", get(get_indicators))
}

/// Returns one result per requested market, in request order.
///
/// Results are served from the cache while fresh; concurrent requests for
/// the same markets, period and unit share a single batch computation.
async fn get_indicators(
    State(state): State<AppState>,
    Query(params): Query<IndicatorQuery>,
) -> Result<Json<Vec<IndicatorResult>>, ApiError> {
    let request = IndicatorRequest::parse(
        params.markets.as_deref(),
        params.period.as_deref(),
        params.unit.as_deref(),
    )?;
    info!(
        markets = ?request.symbols,
        period = request.period,
        unit = request.unit.minutes(),
        "Indicator request"
    );

    let key = CacheKey::indicator(&request.symbols, request.period, request.unit);
    let service = state.indicators.clone();
    let (symbols, period, unit) = (request.symbols.clone(), request.period, request.unit);
    let value = state
        .cache
        .fetch(key, move || async move {
            let results = service.compute_batch(&symbols, period, unit).await?;
            Ok(CachedValue::Indicators(results))
        })
        .await;

    match value {
        Some(CachedValue::Indicators(results)) => Ok(Json(in_request_order(&request, results))),
        _ => Err(ApiError(PulseError::Io(
            "indicator computation produced no result".to_string(),
        ))),
    }
}

/// Reorders cached results to match the request; the cache key ignores order.
fn in_request_order(request: &IndicatorRequest, results: Vec<IndicatorResult>) -> Vec<IndicatorResult> {
    let mut by_symbol: HashMap<String, Option<f64>> = results
        .into_iter()
        .map(|result| (result.symbol, result.value))
        .collect();

    request
        .symbols
        .iter()
        .map(|symbol| IndicatorResult {
            symbol: symbol.clone(),
            value: by_symbol.remove(symbol).flatten(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorders_to_request() {
        let request = IndicatorRequest::parse(Some("KRW-ETH,KRW-BTC"), None, None).unwrap();
        let cached = vec![
            IndicatorResult {
                symbol: "KRW-BTC".to_string(),
                value: Some(40.0),
            },
            IndicatorResult::absent("KRW-ETH"),
        ];

        let ordered = in_request_order(&request, cached);

        assert_eq!(
            ordered,
            vec![
                IndicatorResult::absent("KRW-ETH"),
                IndicatorResult {
                    symbol: "KRW-BTC".to_string(),
                    value: Some(40.0),
                },
            ]
        );
    }
}
