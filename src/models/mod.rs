//! Wire models for the Upbit quotation API and the streaming endpoint.
//!
//! Contains message-kind definitions, the subscription announcement
//! frame, and the per-category record types held in the market cache.

pub mod balance;
pub mod candle;
pub mod indicator;
pub mod market;
pub mod orders;
pub mod ticker;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identifier for a tradable market pair (e.g. `"KRW-BTC"`).
pub type Symbol = String;

/// Message kinds the streaming endpoint can deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Ticker,
    Orderbook,
    Trade,
}

impl MessageKind {
    /// Returns the wire-format type name expected by the streaming API.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Ticker => "ticker",
            MessageKind::Orderbook => "orderbook",
            MessageKind::Trade => "trade",
        }
    }

    /// Parses a wire-format discriminant, returning `None` for unknown kinds.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "ticker" => Some(MessageKind::Ticker),
            "orderbook" => Some(MessageKind::Orderbook),
            "trade" => Some(MessageKind::Trade),
            _ => None,
        }
    }
}

/// The symbols and message kinds consumers currently want streamed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    pub symbols: BTreeSet<Symbol>,
    pub kinds: BTreeSet<MessageKind>,
}

impl SubscriptionSet {
    /// Builds a set, trimming symbols and discarding blanks and duplicates.
    pub fn new<S, K>(symbols: S, kinds: K) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        K: IntoIterator<Item = MessageKind>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            kinds: kinds.into_iter().collect(),
        }
    }

    /// A subscription needs both at least one symbol and one kind to be
    /// worth a connection.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() || self.kinds.is_empty()
    }
}

/// One element of the announcement array sent after the handshake.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnnouncementField {
    /// Leading request identifier.
    Ticket { ticket: String },
    /// One entry per requested message kind.
    Kind(KindRequest),
}

/// A per-kind subscription request inside the announcement.
#[derive(Debug, Serialize)]
pub struct KindRequest {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub codes: Vec<Symbol>,
    #[serde(rename = "isOnlyRealtime")]
    pub is_only_realtime: bool,
}

/// The subscription announcement frame: `[{ticket}, {type, codes, isOnlyRealtime}, ...]`.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct SubscribeAnnouncement(pub Vec<AnnouncementField>);

impl SubscribeAnnouncement {
    /// Builds the announcement for every kind in `set`, each listing every symbol.
    pub fn new(ticket: impl Into<String>, set: &SubscriptionSet) -> Self {
        let codes: Vec<Symbol> = set.symbols.iter().cloned().collect();
        let mut fields = vec![AnnouncementField::Ticket {
            ticket: ticket.into(),
        }];
        fields.extend(set.kinds.iter().map(|kind| {
            AnnouncementField::Kind(KindRequest {
                kind: *kind,
                codes: codes.clone(),
                is_only_realtime: true,
            })
        }));
        Self(fields)
    }
}

/// Error body returned by the HTTP API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
