//! Subscription announcement sent after every handshake and set change.

use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::SinkExt;
use tracing::{debug, info};
use tungstenite::Message;

use super::WsWriter;
use crate::Result;
use crate::models::{SubscribeAnnouncement, SubscriptionSet};

/// Returns a ticket identifying one announcement.
pub fn new_ticket() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("coinpulse-{millis}")
}

/// Serializes the announcement for `set` into a text frame.
///
/// # Errors
///
/// Returns a JSON error if serialization fails.
pub fn announcement_frame(ticket: &str, set: &SubscriptionSet) -> Result<Message> {
    let json = serde_json::to_string(&SubscribeAnnouncement::new(ticket, set))?;
    Ok(Message::Text(json.into()))
}

/// Announces every symbol and kind in `set` on the open transport.
///
/// # Errors
///
/// Returns a [`PulseError`](crate::PulseError) if serialization or sending fails.
pub async fn announce(write: &mut WsWriter, set: &SubscriptionSet) -> Result<()> {
    let ticket = new_ticket();
    let frame = announcement_frame(&ticket, set)?;
    debug!(ticket, "Sending subscription announcement");
    write.send(frame).await?;
    info!(
        symbols = ?set.symbols,
        kinds = ?set.kinds,
        "Subscription announced"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::MessageKind;

    #[test]
    fn announcement_lists_every_kind_with_every_symbol() {
        let set = SubscriptionSet::new(
            ["KRW-ETH", "KRW-BTC"],
            [MessageKind::Ticker, MessageKind::Trade],
        );

        let Message::Text(text) = announcement_frame("t-1", &set).unwrap() else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();

        assert_eq!(
            value,
            json!([
                {"ticket": "t-1"},
                {"type": "ticker", "codes": ["KRW-BTC", "KRW-ETH"], "isOnlyRealtime": true},
                {"type": "trade", "codes": ["KRW-BTC", "KRW-ETH"], "isOnlyRealtime": true}
            ])
        );
    }

    #[test]
    fn tickets_are_prefixed() {
        assert!(new_ticket().starts_with("coinpulse-"));
    }
}
