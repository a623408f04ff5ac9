//! Ticker models: the polled snapshot and the streamed update.

use serde::{Deserialize, Serialize};

use super::Symbol;

/// Direction of the last price relative to the previous close.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Change {
    Rise,
    Even,
    Fall,
}

/// Full last-known ticker record for one market, as returned by
/// `GET /v1/ticker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub market: Symbol,
    pub trade_price: f64,
    pub signed_change_price: f64,
    /// Fractional change rate (0.05 = 5%).
    pub signed_change_rate: f64,
    pub acc_trade_price_24h: f64,
    pub acc_trade_volume_24h: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub opening_price: f64,
    pub prev_closing_price: f64,
    pub change: Change,
    /// Event time in milliseconds since the epoch.
    pub timestamp: i64,
}

/// A `ticker` frame from the streaming endpoint.
///
/// Carries a subset of [`TickerSnapshot`]'s fields keyed by `code`
/// instead of `market`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TickerStreamMessage {
    #[serde(rename = "type")]
    pub tpe: String,
    pub code: Symbol,
    pub trade_price: f64,
    pub signed_change_price: f64,
    pub signed_change_rate: f64,
    pub acc_trade_price_24h: f64,
    pub acc_trade_volume_24h: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub opening_price: f64,
    pub change: Change,
    pub timestamp: i64,
}

impl TickerSnapshot {
    /// Overwrites only the fields carried by a streamed update.
    ///
    /// `market` and `prev_closing_price` are left untouched.
    pub fn apply(&mut self, update: &TickerStreamMessage) {
        self.trade_price = update.trade_price;
        self.signed_change_price = update.signed_change_price;
        self.signed_change_rate = update.signed_change_rate;
        self.acc_trade_price_24h = update.acc_trade_price_24h;
        self.acc_trade_volume_24h = update.acc_trade_volume_24h;
        self.high_price = update.high_price;
        self.low_price = update.low_price;
        self.opening_price = update.opening_price;
        self.change = update.change;
        self.timestamp = update.timestamp;
    }
}
