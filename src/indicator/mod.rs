//! Momentum indicators computed from exchange candle history.
//!
//! - [`rsi`] - Wilder RSI arithmetic
//! - [`batch`] - rate-limit aware batched computation across markets

pub mod batch;
pub mod rsi;

pub use batch::{
    BatchConfig, DEFAULT_PERIOD, HistorySource, IndicatorBatchService, IndicatorRequest,
    MAX_PERIOD, MIN_PERIOD, MinuteUnit,
};
pub use rsi::{round_one_decimal, wilder_rsi};
