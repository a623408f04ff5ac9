//! Driver task executing [`StreamMachine`] commands against a real transport.
//!
//! The driver owns the socket halves, the in-flight connection attempt and
//! the single reconnect timer. Everything it observes (handshake results,
//! frames, timer expiry, consumer requests) is turned into an [`Input`];
//! every decision comes back from the machine as a [`Command`].

use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};
use tungstenite::Message;

use super::handler::{FrameStats, handle_frame};
use super::machine::{Command, ConnectionState, Input, StreamMachine};
use super::subscription::announce;
use super::{WsReader, WsWriter, connect};
use crate::Result;
use crate::cache::MarketCache;

/// Upper bound for sending the close frame on teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type ConnectAttempt = BoxFuture<'static, Result<(WsWriter, WsReader)>>;

pub(super) struct Driver {
    url: String,
    tls_config: Arc<rustls::ClientConfig>,
    cache: MarketCache,
    stats: Arc<FrameStats>,
    machine: StreamMachine,
    status: watch::Sender<ConnectionState>,
    inputs: mpsc::UnboundedReceiver<Input>,
    connecting: Option<ConnectAttempt>,
    writer: Option<WsWriter>,
    reader: Option<WsReader>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    pub(super) fn new(
        url: String,
        tls_config: Arc<rustls::ClientConfig>,
        cache: MarketCache,
        stats: Arc<FrameStats>,
        status: watch::Sender<ConnectionState>,
        inputs: mpsc::UnboundedReceiver<Input>,
    ) -> Self {
        Self {
            url,
            tls_config,
            cache,
            stats,
            machine: StreamMachine::default(),
            status,
            inputs,
            connecting: None,
            writer: None,
            reader: None,
            retry: None,
        }
    }

    /// Runs until [`Input::Shutdown`] arrives or every sender is dropped.
    pub(super) async fn run(mut self) {
        info!(url = %self.url, "Stream driver started");
        let mut queue = VecDeque::new();

        loop {
            let input = tokio::select! {
                input = self.inputs.recv() => input.unwrap_or(Input::Shutdown),

                result = next_attempt(&mut self.connecting) => {
                    self.connecting = None;
                    match result {
                        Ok((writer, reader)) => {
                            self.writer = Some(writer);
                            self.reader = Some(reader);
                            Input::Opened
                        }
                        Err(e) => {
                            warn!(error = %e, "Stream connection failed");
                            Input::TransportFailed
                        }
                    }
                }

                frame = next_frame(&mut self.reader) => match frame {
                    Some(Ok(Message::Close(reason))) => {
                        info!(?reason, "Stream closed by peer");
                        Input::TransportClosed
                    }
                    Some(Ok(message)) => {
                        handle_frame(&message, &self.cache, &self.stats);
                        continue;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Stream read failed");
                        Input::TransportFailed
                    }
                    None => {
                        warn!("Stream ended");
                        Input::TransportClosed
                    }
                },

                () = next_retry(&mut self.retry) => {
                    self.retry = None;
                    Input::RetryElapsed
                }
            };

            queue.push_back(input);
            while let Some(input) = queue.pop_front() {
                let shutting_down = input == Input::Shutdown;
                for command in self.machine.handle(input) {
                    if let Some(follow_up) = self.execute(command).await {
                        queue.push_back(follow_up);
                    }
                }
                if shutting_down {
                    info!("Stream driver stopped");
                    return;
                }
            }
        }
    }

    /// Executes one command, returning an input if the command itself failed.
    async fn execute(&mut self, command: Command) -> Option<Input> {
        match command {
            Command::Connect => {
                self.teardown().await;
                info!(url = %self.url, "Connecting stream");
                let url = self.url.clone();
                let tls_config = self.tls_config.clone();
                self.connecting = Some(async move { connect(&url, tls_config).await }.boxed());
            }
            Command::Disconnect => self.teardown().await,
            Command::Announce(set) => {
                let Some(writer) = self.writer.as_mut() else {
                    debug!(markets = ?set.symbols, "No open transport, announcement skipped");
                    return None;
                };
                if let Err(e) = announce(writer, &set).await {
                    error!(error = %e, "Failed to announce subscription");
                    return Some(Input::TransportFailed);
                }
            }
            Command::ScheduleRetry(delay) => {
                info!(backoff_ms = delay.as_millis() as u64, "Scheduling reconnect");
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
            }
            Command::CancelRetry => self.retry = None,
            Command::Publish(state) => {
                self.status.send_replace(state);
            }
        }
        None
    }

    async fn teardown(&mut self) {
        self.connecting = None;
        self.reader = None;
        if let Some(mut writer) = self.writer.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, writer.close()).await {
                Ok(Ok(())) => info!("Stream closed"),
                Ok(Err(e)) => warn!(error = %e, "Stream close failed"),
                Err(_) => warn!("Stream close timed out"),
            }
        }
    }
}

async fn next_attempt(connecting: &mut Option<ConnectAttempt>) -> Result<(WsWriter, WsReader)> {
    match connecting {
        Some(attempt) => attempt.await,
        None => pending().await,
    }
}

async fn next_frame(reader: &mut Option<WsReader>) -> Option<tungstenite::Result<Message>> {
    match reader {
        Some(reader) => reader.next().await,
        None => pending().await,
    }
}

async fn next_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use crate::models::{MessageKind, SubscriptionSet};
    use crate::tls::shared_tls_config;

    fn driver() -> (Driver, watch::Receiver<ConnectionState>) {
        let (status_tx, status) = watch::channel(ConnectionState::Idle);
        let (_inputs, input_rx) = mpsc::unbounded_channel();
        let driver = Driver::new(
            "ws://127.0.0.1:9".to_string(),
            shared_tls_config().unwrap(),
            MarketCache::new(CachePolicy::default()),
            Arc::new(FrameStats::default()),
            status_tx,
            input_rx,
        );
        (driver, status)
    }

    #[tokio::test]
    async fn announce_without_transport_is_skipped() {
        let (mut driver, status) = driver();
        let set = SubscriptionSet::new(["KRW-BTC"], [MessageKind::Ticker]);

        assert!(driver.execute(Command::Announce(set)).await.is_none());
        assert!(driver.writer.is_none());
        assert_eq!(*status.borrow(), ConnectionState::Idle);
    }
}
