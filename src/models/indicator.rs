//! Indicator results returned by the batch service.

use serde::{Deserialize, Serialize};

use super::Symbol;

/// RSI for one market; `value` is `None` when history was insufficient
/// or the upstream fetch for this market failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    #[serde(rename = "market")]
    pub symbol: Symbol,
    #[serde(rename = "rsi")]
    pub value: Option<f64>,
}

impl IndicatorResult {
    pub fn absent(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            value: None,
        }
    }
}
