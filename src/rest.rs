//! REST client for the Upbit quotation API.
//!
//! Public endpoints only: tickers, minute candles and the market list.
//! Every non-2xx answer becomes [`PulseError::Upstream`] carrying the
//! upstream status and body so HTTP pass-throughs can relay it.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::indicator::{HistorySource, MinuteUnit};
use crate::models::Symbol;
use crate::models::candle::{CandleSample, CandleSeries, SeriesRejection};
use crate::models::market::MarketInfo;
use crate::models::ticker::TickerSnapshot;
use crate::{PulseError, Result};

/// Per-request timeout applied to every upstream call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin typed wrapper over the quotation endpoints.
#[derive(Clone, Debug)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    /// Creates a client rooted at `base_url` (e.g. `https://api.upbit.com`).
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Tls`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, tls_config: Arc<rustls::ClientConfig>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .use_preconfigured_tls((*tls_config).clone())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PulseError::Tls(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches current tickers for `markets`.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Upstream`] on a non-2xx answer, or an HTTP /
    /// JSON error if the request or decoding fails.
    pub async fn tickers(&self, markets: &[Symbol]) -> Result<Vec<TickerSnapshot>> {
        let url = format!("{}/v1/ticker", self.base_url);
        self.get_json(&url, &[("markets", markets.join(","))]).await
    }

    /// Fetches up to `count` minute candles, most recent first.
    ///
    /// # Errors
    ///
    /// See [`RestClient::tickers`].
    pub async fn candles(
        &self,
        market: &str,
        unit: MinuteUnit,
        count: u32,
    ) -> Result<Vec<CandleSample>> {
        let url = format!("{}/v1/candles/minutes/{}", self.base_url, unit.minutes());
        self.get_json(
            &url,
            &[("market", market.to_string()), ("count", count.to_string())],
        )
        .await
    }

    /// Fetches the market list, keeping only KRW-quoted markets.
    ///
    /// # Errors
    ///
    /// See [`RestClient::tickers`].
    pub async fn krw_markets(&self) -> Result<Vec<MarketInfo>> {
        let url = format!("{}/v1/market/all", self.base_url);
        let markets: Vec<MarketInfo> = self
            .get_json(&url, &[("is_details", "false".to_string())])
            .await?;
        Ok(markets.into_iter().filter(MarketInfo::is_krw).collect())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PulseError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        debug!(url, bytes = bytes.len(), "Upstream response");
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl HistorySource for RestClient {
    async fn fetch_closes(&self, symbol: &str, unit: MinuteUnit, count: u32) -> Result<Vec<f64>> {
        let url = format!("{}/v1/candles/minutes/{}", self.base_url, unit.minutes());
        let payload: serde_json::Value = self
            .get_json(
                &url,
                &[("market", symbol.to_string()), ("count", count.to_string())],
            )
            .await?;

        let (series, rejected) = series_from_payload(&payload)?;
        if !rejected.is_empty() {
            warn!(
                market = symbol,
                rejected = rejected.len(),
                kept = series.len(),
                "Skipped misordered candles"
            );
        }

        let mut closes = series.closes();
        closes.reverse();
        Ok(closes)
    }
}

/// Builds a strictly ordered series from a most-recent-first candle array.
///
/// # Errors
///
/// Returns [`PulseError::MalformedPayload`] if the payload is not an
/// array, is empty, or any element is not a candle.
pub fn series_from_payload(
    payload: &serde_json::Value,
) -> Result<(CandleSeries, Vec<SeriesRejection>)> {
    let candles = payload
        .as_array()
        .ok_or_else(|| PulseError::MalformedPayload("expected a JSON array".to_string()))?;

    if candles.is_empty() {
        return Err(PulseError::MalformedPayload("empty candle array".to_string()));
    }

    let samples = candles
        .iter()
        .map(|candle| {
            CandleSample::deserialize(candle)
                .map_err(|e| PulseError::MalformedPayload(format!("invalid candle: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CandleSeries::from_descending(samples))
}
