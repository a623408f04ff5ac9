//! Incoming frame decoding and dispatch into the cache.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use tungstenite::Message;

use crate::cache::MarketCache;
use crate::models::MessageKind;
use crate::models::ticker::TickerStreamMessage;

/// Counters for inbound data frames.
///
/// Malformed and unknown frames are dropped without surfacing an error;
/// these counters keep them observable.
#[derive(Debug, Default)]
pub struct FrameStats {
    received: AtomicU64,
    applied: AtomicU64,
    dropped_malformed: AtomicU64,
    dropped_unknown: AtomicU64,
}

/// A point-in-time copy of [`FrameStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStatsSnapshot {
    pub received: u64,
    pub applied: u64,
    pub dropped_malformed: u64,
    pub dropped_unknown: u64,
}

impl FrameStats {
    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            dropped_malformed: self.dropped_malformed.load(Ordering::Relaxed),
            dropped_unknown: self.dropped_unknown.load(Ordering::Relaxed),
        }
    }
}

/// What happened to one inbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A ticker update was merged into this many cached snapshots.
    Applied(usize),
    /// A known kind the cache does not hold.
    Ignored(MessageKind),
    /// Not JSON, not UTF-8, or a known kind with an unexpected shape.
    Malformed,
    /// JSON without a known `type` discriminant (keep-alives, status).
    Unknown,
    /// A control frame.
    Control,
}

/// Decodes one frame and applies it to the cache.
///
/// Text and binary frames are both treated as UTF-8 JSON.
pub fn handle_frame(message: &Message, cache: &MarketCache, stats: &FrameStats) -> FrameOutcome {
    let text = match message {
        Message::Text(text) => text.as_str(),
        Message::Binary(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                stats.received.fetch_add(1, Ordering::Relaxed);
                return drop_malformed(stats, "binary frame is not UTF-8");
            }
        },
        _ => return FrameOutcome::Control,
    };
    stats.received.fetch_add(1, Ordering::Relaxed);

    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return drop_malformed(stats, "frame is not JSON"),
    };

    let Some(kind) = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .and_then(MessageKind::from_wire)
    else {
        stats.dropped_unknown.fetch_add(1, Ordering::Relaxed);
        debug!(frame = %truncate(text), "Dropping frame without known type");
        return FrameOutcome::Unknown;
    };

    match kind {
        MessageKind::Ticker => match serde_json::from_value::<TickerStreamMessage>(value) {
            Ok(update) => {
                let patched = cache.merge_ticker(&update);
                stats.applied.fetch_add(1, Ordering::Relaxed);
                debug!(
                    market = update.code,
                    trade_price = update.trade_price,
                    patched,
                    "Ticker update"
                );
                FrameOutcome::Applied(patched)
            }
            Err(e) => drop_malformed(stats, &e.to_string()),
        },
        other => FrameOutcome::Ignored(other),
    }
}

fn drop_malformed(stats: &FrameStats, reason: &str) -> FrameOutcome {
    stats.dropped_malformed.fetch_add(1, Ordering::Relaxed);
    debug!(reason, "Dropping malformed frame");
    FrameOutcome::Malformed
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(120) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::{CacheKey, CachePolicy, CachedValue};
    use crate::models::ticker::{Change, TickerSnapshot};

    fn cached_btc() -> MarketCache {
        let cache = MarketCache::new(CachePolicy::default());
        cache.replace(
            CacheKey::ticker(["KRW-BTC"]),
            CachedValue::Tickers(vec![TickerSnapshot {
                market: "KRW-BTC".to_string(),
                trade_price: 90_000_000.0,
                signed_change_price: 0.0,
                signed_change_rate: 0.0,
                acc_trade_price_24h: 0.0,
                acc_trade_volume_24h: 0.0,
                high_price: 90_000_000.0,
                low_price: 90_000_000.0,
                opening_price: 90_000_000.0,
                prev_closing_price: 89_000_000.0,
                change: Change::Even,
                timestamp: 0,
            }]),
        );
        cache
    }

    fn ticker_frame(code: &str, price: f64) -> String {
        json!({
            "type": "ticker",
            "code": code,
            "trade_price": price,
            "signed_change_price": 1_000_000.0,
            "signed_change_rate": 0.0112,
            "acc_trade_price_24h": 1.2e11,
            "acc_trade_volume_24h": 1_340.5,
            "high_price": 91_500_000.0,
            "low_price": 88_700_000.0,
            "opening_price": 89_100_000.0,
            "prev_closing_price": 1.0,
            "change": "RISE",
            "timestamp": 1_717_000_000_000_i64,
            "stream_type": "REALTIME"
        })
        .to_string()
    }

    #[test]
    fn text_ticker_is_merged() {
        let cache = cached_btc();
        let stats = FrameStats::default();

        let outcome = handle_frame(
            &Message::Text(ticker_frame("KRW-BTC", 91_000_000.0).into()),
            &cache,
            &stats,
        );

        assert_eq!(outcome, FrameOutcome::Applied(1));
        let tickers = cache.tickers(&CacheKey::ticker(["KRW-BTC"])).unwrap();
        assert_eq!(tickers[0].trade_price, 91_000_000.0);
        assert_eq!(tickers[0].prev_closing_price, 89_000_000.0);
        assert_eq!(stats.snapshot().applied, 1);
    }

    #[test]
    fn binary_ticker_is_decoded() {
        let cache = cached_btc();
        let stats = FrameStats::default();
        let bytes = ticker_frame("KRW-BTC", 92_000_000.0).into_bytes();

        let outcome = handle_frame(&Message::Binary(bytes.into()), &cache, &stats);

        assert_eq!(outcome, FrameOutcome::Applied(1));
    }

    #[test]
    fn ticker_for_uncached_market_adds_nothing() {
        let cache = cached_btc();
        let stats = FrameStats::default();

        let outcome = handle_frame(
            &Message::Text(ticker_frame("KRW-DOGE", 200.0).into()),
            &cache,
            &stats,
        );

        assert_eq!(outcome, FrameOutcome::Applied(0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn garbage_is_counted_not_raised() {
        let cache = cached_btc();
        let stats = FrameStats::default();

        handle_frame(&Message::Text("not json {".to_string().into()), &cache, &stats);
        handle_frame(&Message::Binary(vec![0xff, 0xfe].into()), &cache, &stats);
        handle_frame(
            &Message::Text(r#"{"type":"ticker","code":"KRW-BTC"}"#.to_string().into()),
            &cache,
            &stats,
        );
        handle_frame(&Message::Text(r#"{"status":"UP"}"#.to_string().into()), &cache, &stats);
        handle_frame(&Message::Text(r#"{"type":"candle"}"#.to_string().into()), &cache, &stats);

        assert_eq!(
            stats.snapshot(),
            FrameStatsSnapshot {
                received: 5,
                applied: 0,
                dropped_malformed: 3,
                dropped_unknown: 2,
            }
        );
    }

    #[test]
    fn known_uncached_kind_is_ignored() {
        let cache = cached_btc();
        let stats = FrameStats::default();

        let outcome = handle_frame(
            &Message::Text(r#"{"type":"trade","code":"KRW-BTC"}"#.to_string().into()),
            &cache,
            &stats,
        );

        assert_eq!(outcome, FrameOutcome::Ignored(MessageKind::Trade));
    }

    #[test]
    fn control_frames_are_not_counted() {
        let cache = cached_btc();
        let stats = FrameStats::default();

        let outcome = handle_frame(&Message::Ping(Vec::new().into()), &cache, &stats);

        assert_eq!(outcome, FrameOutcome::Control);
        assert_eq!(stats.snapshot(), FrameStatsSnapshot::default());
    }
}
