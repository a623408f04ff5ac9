//! Connection state machine for the streaming client.
//!
//! [`StreamMachine`] owns every decision about when to connect, announce,
//! retry or stay closed. It performs no I/O: each [`Input`] is turned into
//! a list of [`Command`]s that the driver task executes.

use std::time::Duration;

use tracing::debug;

use crate::models::SubscriptionSet;

/// Delay before the first reconnect after a failure.
pub const BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for the reconnect delay.
pub const MAX_DELAY: Duration = Duration::from_secs(30);

/// Lifecycle of the streaming connection as seen by consumers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Errored => "errored",
        }
    }

    /// Whether a transport is being established or is established.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

/// Exponential reconnect delay: 1 s, 2 s, 4 s, ... capped at 30 s.
#[derive(Clone, Debug)]
pub struct Backoff {
    attempts: u32,
    base: Duration,
    max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BASE_DELAY, MAX_DELAY)
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            attempts: 0,
            base,
            max,
        }
    }

    /// Returns the delay for the next retry and counts the attempt.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u32.checked_shl(self.attempts).unwrap_or(u32::MAX);
        let delay = self.base.saturating_mul(factor).min(self.max);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Events fed to the machine by consumers, the transport and timers.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    /// Consumers now want this set streamed.
    SetSubscription(SubscriptionSet),
    /// Host visibility changed; `true` means visible.
    Visibility(bool),
    /// Manual recovery: reconnect now with the backoff reset.
    ManualReconnect,
    /// Transport handshake completed.
    Opened,
    /// Handshake, read or write failed.
    TransportFailed,
    /// Peer closed the transport.
    TransportClosed,
    /// The pending reconnect timer fired.
    RetryElapsed,
    /// Stop for good.
    Shutdown,
}

/// Side effects requested by the machine.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Open a new transport, replacing any current one.
    Connect,
    /// Tear down the current transport or connection attempt.
    Disconnect,
    /// Send the subscription announcement for the given set.
    Announce(SubscriptionSet),
    /// Arm the reconnect timer, replacing any pending one.
    ScheduleRetry(Duration),
    /// Disarm the reconnect timer.
    CancelRetry,
    /// Expose a new state to consumers.
    Publish(ConnectionState),
}

#[derive(Debug)]
pub struct StreamMachine {
    state: ConnectionState,
    subscription: SubscriptionSet,
    visible: bool,
    /// Set when the current closure was requested, which suppresses retries.
    intentional_close: bool,
    retry_pending: bool,
    backoff: Backoff,
    shut_down: bool,
}

impl Default for StreamMachine {
    fn default() -> Self {
        Self::new(Backoff::default())
    }
}

impl StreamMachine {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            state: ConnectionState::Idle,
            subscription: SubscriptionSet::default(),
            visible: true,
            intentional_close: false,
            retry_pending: false,
            backoff,
            shut_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn subscription(&self) -> &SubscriptionSet {
        &self.subscription
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    fn wants_connection(&self) -> bool {
        !self.shut_down && self.visible && !self.subscription.is_empty()
    }

    /// Applies one input and returns the commands to execute, in order.
    pub fn handle(&mut self, input: Input) -> Vec<Command> {
        if self.shut_down {
            debug!(?input, "Ignoring input after shutdown");
            return Vec::new();
        }

        let mut out = Vec::new();
        match input {
            Input::SetSubscription(set) => self.on_subscription(set, &mut out),
            Input::Visibility(visible) => self.on_visibility(visible, &mut out),
            Input::ManualReconnect => {
                if self.wants_connection() {
                    self.backoff.reset();
                    self.start_connecting(&mut out);
                }
            }
            Input::Opened => {
                if self.state == ConnectionState::Connecting {
                    self.backoff.reset();
                    self.transition(ConnectionState::Open, &mut out);
                    out.push(Command::Announce(self.subscription.clone()));
                }
            }
            Input::TransportFailed => self.on_transport_lost(true, &mut out),
            Input::TransportClosed => self.on_transport_lost(false, &mut out),
            Input::RetryElapsed => {
                self.retry_pending = false;
                if self.wants_connection()
                    && !self.intentional_close
                    && !self.state.is_active()
                {
                    self.start_connecting(&mut out);
                }
            }
            Input::Shutdown => {
                self.close_intentionally(&mut out);
                self.shut_down = true;
            }
        }
        out
    }

    fn on_subscription(&mut self, set: SubscriptionSet, out: &mut Vec<Command>) {
        if set == self.subscription {
            return;
        }
        self.subscription = set;

        if self.subscription.is_empty() {
            self.close_intentionally(out);
            return;
        }

        match self.state {
            ConnectionState::Open => out.push(Command::Announce(self.subscription.clone())),
            // The announcement sent on open uses the latest set.
            ConnectionState::Connecting => {}
            _ => {
                if self.visible {
                    self.start_connecting(out);
                }
            }
        }
    }

    fn on_visibility(&mut self, visible: bool, out: &mut Vec<Command>) {
        if visible == self.visible {
            return;
        }
        self.visible = visible;

        if !visible {
            self.close_intentionally(out);
            return;
        }

        self.backoff.reset();
        if !self.subscription.is_empty() {
            self.start_connecting(out);
        }
    }

    fn on_transport_lost(&mut self, failed: bool, out: &mut Vec<Command>) {
        if !self.state.is_active() {
            return;
        }

        out.push(Command::Disconnect);
        if failed {
            self.transition(ConnectionState::Errored, out);
        }
        self.transition(ConnectionState::Closed, out);

        if self.intentional_close || !self.wants_connection() {
            return;
        }
        let delay = self.backoff.next_delay();
        self.retry_pending = true;
        out.push(Command::ScheduleRetry(delay));
    }

    /// Drops any pending retry and any transport, and moves to a connection attempt.
    fn start_connecting(&mut self, out: &mut Vec<Command>) {
        self.cancel_retry(out);
        self.intentional_close = false;
        if self.state.is_active() {
            out.push(Command::Disconnect);
        }
        out.push(Command::Connect);
        self.transition(ConnectionState::Connecting, out);
    }

    fn close_intentionally(&mut self, out: &mut Vec<Command>) {
        self.intentional_close = true;
        self.cancel_retry(out);
        if self.state.is_active() {
            out.push(Command::Disconnect);
            self.transition(ConnectionState::Closed, out);
        }
    }

    fn cancel_retry(&mut self, out: &mut Vec<Command>) {
        if self.retry_pending {
            self.retry_pending = false;
            out.push(Command::CancelRetry);
        }
    }

    fn transition(&mut self, next: ConnectionState, out: &mut Vec<Command>) {
        if self.state != next {
            debug!(from = self.state.as_str(), to = next.as_str(), "Stream state change");
            self.state = next;
            out.push(Command::Publish(next));
        }
    }
}
