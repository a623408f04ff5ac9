//! Crate-level error types.
//!
//! [`PulseError`] unifies every error source (configuration, WebSocket,
//! HTTP, JSON, request validation) behind a single enum so callers can
//! match on the variant they care about while still using the `?`
//! operator for easy propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    /// A configuration value could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The TLS client configuration could not be built.
    #[error("tls error: {0}")]
    Tls(String),

    /// A terminal or filesystem operation failed.
    #[error("io error: {0}")]
    Io(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// An HTTP request to the exchange failed before a response arrived.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The exchange answered with a non-success status.
    #[error("upstream request failed: {status} - {body}")]
    Upstream { status: u16, body: String },

    /// The exchange answered 2xx but the payload was unusable.
    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A caller-supplied request was rejected before any upstream call.
    #[error("{0}")]
    Validation(String),
}

impl PulseError {
    /// Returns `true` for errors caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(self, PulseError::Validation(_))
    }
}
