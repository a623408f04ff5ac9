//! Streaming client for the Upbit WebSocket quotation feed.
//!
//! This module is organized by concern:
//! - [`machine`] - Connection state machine and reconnect backoff
//! - [`subscription`] - Subscription announcement frames
//! - [`handler`] - Inbound frame decoding into the cache
//! - `connection` - Driver task owning the transport and timers
//!
//! [`StreamClient`] is the handle consumers hold. It only sends requests
//! to the driver task; connection state is observed through a watch
//! channel and market data through the [`MarketCache`].

mod connection;
pub mod handler;
pub mod machine;
pub mod subscription;

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};
use tungstenite::Message;

use crate::Result;
use crate::cache::MarketCache;
use crate::models::{MessageKind, Symbol, SubscriptionSet};

use connection::Driver;
pub use handler::{FrameStats, FrameStatsSnapshot};
pub use machine::{Backoff, ConnectionState, Input};

/// Write half of a streaming connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a streaming connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Establishes a WebSocket connection to the given URL.
///
/// # Errors
///
/// Returns a [`PulseError`](crate::PulseError) if the connection or TLS handshake fails.
pub async fn connect(url: &str, tls_config: Arc<rustls::ClientConfig>) -> Result<(WsWriter, WsReader)> {
    let connector = Connector::Rustls(tls_config);
    let (ws_stream, _) =
        tokio_tungstenite::connect_async_tls_with_config(url, None, false, Some(connector))
            .await?;
    info!("WebSocket handshake completed");

    Ok(ws_stream.split())
}

/// Handle to the single streaming connection.
///
/// Dropping the client without calling [`StreamClient::shutdown`] also
/// stops the driver task. [`StreamSubscription`]s do not keep it alive.
pub struct StreamClient {
    inputs: mpsc::UnboundedSender<Input>,
    status: watch::Receiver<ConnectionState>,
    stats: Arc<FrameStats>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamClient {
    /// Spawns the driver task. No connection is made until a non-empty
    /// subscription is set.
    pub fn spawn(
        url: impl Into<String>,
        tls_config: Arc<rustls::ClientConfig>,
        cache: MarketCache,
    ) -> Self {
        let (inputs, input_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(ConnectionState::Idle);
        let stats = Arc::new(FrameStats::default());

        let driver = Driver::new(
            url.into(),
            tls_config,
            cache,
            stats.clone(),
            status_tx,
            input_rx,
        );
        let task = tokio::spawn(driver.run());

        Self {
            inputs,
            status,
            stats,
            task: Mutex::new(Some(task)),
        }
    }

    /// Replaces the desired subscription and returns a handle to it.
    ///
    /// An empty symbol or kind list closes the connection without retrying.
    pub fn subscribe<S, K>(&self, symbols: S, kinds: K) -> StreamSubscription
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        K: IntoIterator<Item = MessageKind>,
    {
        self.send(Input::SetSubscription(SubscriptionSet::new(symbols, kinds)));
        StreamSubscription {
            inputs: self.inputs.downgrade(),
            status: self.status.clone(),
        }
    }

    /// Tickers-only subscription for `symbols`.
    pub fn subscribe_tickers(&self, symbols: &[Symbol]) -> StreamSubscription {
        self.subscribe(symbols, [MessageKind::Ticker])
    }

    /// Reports host visibility. Hidden closes the stream without retrying;
    /// visible reconnects with the backoff reset.
    pub fn set_visible(&self, visible: bool) {
        self.send(Input::Visibility(visible));
    }

    pub fn status(&self) -> ConnectionState {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.status.clone()
    }

    pub fn stats(&self) -> FrameStatsSnapshot {
        self.stats.snapshot()
    }

    /// Closes the transport, cancels the reconnect timer and waits for the
    /// driver task to finish.
    pub async fn shutdown(&self) {
        self.send(Input::Shutdown);
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Stream driver task failed");
            }
        }
    }

    fn send(&self, input: Input) {
        if self.inputs.send(input).is_err() {
            warn!("Stream driver is gone");
        }
    }
}

/// A consumer's view of the subscription it requested.
#[derive(Clone)]
pub struct StreamSubscription {
    inputs: mpsc::WeakUnboundedSender<Input>,
    status: watch::Receiver<ConnectionState>,
}

impl StreamSubscription {
    pub fn status(&self) -> ConnectionState {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.status.clone()
    }

    /// Reconnects immediately with the backoff reset.
    ///
    /// Does nothing once the owning [`StreamClient`] is gone.
    pub fn reconnect(&self) {
        let sent = self
            .inputs
            .upgrade()
            .is_some_and(|inputs| inputs.send(Input::ManualReconnect).is_ok());
        if !sent {
            warn!("Stream driver is gone");
        }
    }
}
