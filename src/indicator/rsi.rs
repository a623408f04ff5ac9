//! Wilder's relative strength index.

/// Computes Wilder's RSI over chronologically ascending close prices.
///
/// The first `period` deltas seed the average gain and loss; every later
/// delta is folded in with Wilder smoothing,
/// `avg = (avg * (period - 1) + current) / period`.
///
/// Returns `None` when fewer than `period + 1` closes are available or
/// when `period` is zero. The value is not rounded.
pub fn wilder_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let p = period as f64;
    let mut deltas = closes.windows(2).map(|w| w[1] - w[0]);

    let (mut avg_gain, mut avg_loss) = deltas
        .by_ref()
        .take(period)
        .fold((0.0, 0.0), |(gain, loss), change| {
            if change > 0.0 {
                (gain + change, loss)
            } else {
                (gain, loss - change)
            }
        });
    avg_gain /= p;
    avg_loss /= p;

    for change in deltas {
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Rounds to one decimal place, half away from zero.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
