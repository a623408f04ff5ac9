//! Minute candle models.

use serde::{Deserialize, Serialize};

use super::Symbol;

/// A single fixed-duration OHLCV bar from `GET /v1/candles/minutes/{unit}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleSample {
    pub market: Symbol,
    /// Bar-open instant in UTC, ISO 8601 without offset (`2024-01-01T09:15:00`).
    pub candle_date_time_utc: String,
    pub candle_date_time_kst: String,
    pub opening_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    /// Close price of the bar.
    pub trade_price: f64,
    pub candle_acc_trade_volume: f64,
    pub candle_acc_trade_price: f64,
    /// Time of the last trade in the bar, milliseconds since the epoch.
    pub timestamp: i64,
    /// Bar duration in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<u32>,
}

/// Why a sample was not accepted into a [`CandleSeries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesRejection {
    /// The sample opens before the trailing bar.
    OutOfOrder,
    /// The sample's instant matches a bar that is no longer the trailing one.
    Duplicate,
}

/// Candle samples kept strictly increasing by bar-open instant.
///
/// Only the trailing bar may be superseded; every earlier bar is immutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleSeries {
    samples: Vec<CandleSample>,
}

impl CandleSeries {
    /// Builds a series from an exchange response, which is most-recent-first.
    ///
    /// Samples that would break strict ordering are skipped and reported
    /// alongside the series.
    pub fn from_descending(samples: Vec<CandleSample>) -> (Self, Vec<SeriesRejection>) {
        let mut series = Self::default();
        let mut rejected = Vec::new();
        for sample in samples.into_iter().rev() {
            if let Err(rejection) = series.push(sample) {
                rejected.push(rejection);
            }
        }
        (series, rejected)
    }

    /// Appends a newer bar or supersedes the trailing bar.
    ///
    /// # Errors
    ///
    /// Returns a [`SeriesRejection`] if the sample opens before the
    /// trailing bar.
    pub fn push(&mut self, sample: CandleSample) -> Result<(), SeriesRejection> {
        let Some(last) = self.samples.last_mut() else {
            self.samples.push(sample);
            return Ok(());
        };

        // Same-format ISO 8601 strings order lexicographically.
        match sample
            .candle_date_time_utc
            .as_str()
            .cmp(last.candle_date_time_utc.as_str())
        {
            std::cmp::Ordering::Greater => {
                self.samples.push(sample);
                Ok(())
            }
            std::cmp::Ordering::Equal => {
                *last = sample;
                Ok(())
            }
            std::cmp::Ordering::Less => {
                let duplicate = self
                    .samples
                    .iter()
                    .any(|s| s.candle_date_time_utc == sample.candle_date_time_utc);
                if duplicate {
                    Err(SeriesRejection::Duplicate)
                } else {
                    Err(SeriesRejection::OutOfOrder)
                }
            }
        }
    }

    /// Close prices in chronological order.
    pub fn closes(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.trade_price).collect()
    }

    pub fn samples(&self) -> &[CandleSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
