//! Reconnection Supervisor
//!
//! Owns the one live event stream connection and keeps it alive:
//!
//! ```text
//!            start()                 Failed
//!   Idle ───────────────► Connected ────────► AwaitingRetry
//!     ▲                                            │
//!     └──────────────── RetryDue ◄─────────────────┘
//! ```
//!
//! On every failure of the current connection the supervisor
//! 1. raises one "reconnecting" notice,
//! 2. closes and drops the handle,
//! 3. schedules exactly one retry after the policy delay,
//! 4. calls `start()` again when the retry fires.
//!
//! Holding a handle is the guard against a second connection: `start()` is a
//! no-op while one is held. Signals from connections that are no longer
//! current are discarded, so a late failure report cannot trigger a second
//! reconnect. `shutdown()` closes the handle and cancels a pending retry.

use narwatch_common::config::DashboardConfig;
use narwatch_common::StreamEvent;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::notice::{self, NoticeCenter};
use crate::stream::{Connector, StreamHandle, StreamSignal, StreamSink};

/// Delay growth between consecutive failed attempts
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub multiplier: f64,
    pub max_delay: Duration,
}

/// When and how often to reconnect
///
/// The default is a fixed 4 s delay, no backoff and no retry limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub backoff: Option<Backoff>,
    /// Consecutive failures tolerated before giving up; `None` retries forever
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(
            narwatch_common::config::DEFAULT_RECONNECT_DELAY_MS,
        ))
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            backoff: None,
            max_retries: None,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            delay: config.reconnect_delay,
            backoff: config.backoff.as_ref().map(|b| Backoff {
                multiplier: b.multiplier,
                max_delay: Duration::from_millis(b.max_delay_ms),
            }),
            max_retries: config.max_retries,
        }
    }

    pub fn with_backoff(mut self, multiplier: f64, max_delay: Duration) -> Self {
        self.backoff = Some(Backoff {
            multiplier,
            max_delay,
        });
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Delay before the `attempt`-th consecutive retry, counting from 1
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let Some(backoff) = &self.backoff else {
            return self.delay;
        };

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.delay.as_millis() as f64 * backoff.multiplier.powi(exponent);
        let capped = scaled.min(backoff.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and nothing scheduled
    Idle,
    /// A connection handle is held (connecting or open)
    Connected,
    /// Last connection failed; a retry is scheduled
    AwaitingRetry { attempt: u32 },
    /// Shut down, or gave up after `max_retries`; `start()` does nothing
    Stopped,
}

pub struct ReconnectSupervisor {
    connector: Box<dyn Connector>,
    policy: ReconnectPolicy,
    notices: NoticeCenter,
    tx: mpsc::UnboundedSender<StreamSignal>,
    rx: mpsc::UnboundedReceiver<StreamSignal>,
    handle: Option<StreamHandle>,
    connection: u64,
    retry: Option<JoinHandle<()>>,
    retries_scheduled: u64,
    failures: u32,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
}

impl ReconnectSupervisor {
    pub fn new(connector: Box<dyn Connector>, policy: ReconnectPolicy, notices: NoticeCenter) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            connector,
            policy,
            notices,
            tx,
            rx,
            handle: None,
            connection: 0,
            retry: None,
            retries_scheduled: 0,
            failures: 0,
            state: ConnectionState::Idle,
            state_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    pub fn has_pending_retry(&self) -> bool {
        self.retry.is_some()
    }

    /// Connections opened so far, including the current one
    pub fn connections_opened(&self) -> u64 {
        self.connection
    }

    pub fn retries_scheduled(&self) -> u64 {
        self.retries_scheduled
    }

    /// Open a connection unless one is already held
    pub fn start(&mut self) {
        if self.handle.is_some() {
            debug!(connection = self.connection, "Event stream already open, ignoring start");
            return;
        }
        if self.state == ConnectionState::Stopped {
            debug!("Supervisor stopped, ignoring start");
            return;
        }
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }

        self.connection += 1;
        info!(connection = self.connection, "Opening event stream");
        let sink = StreamSink::new(self.connection, self.tx.clone());
        self.handle = Some(self.connector.open(sink));
        self.set_state(ConnectionState::Connected);
    }

    /// Wait for the next event from the current connection
    ///
    /// Failures and retry timers are handled inside this call, so it must be
    /// polled continuously for reconnection to happen. Cancel safe.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        while let Some(signal) = self.rx.recv().await {
            match signal {
                StreamSignal::Opened { connection } if self.is_current(connection) => {
                    debug!(connection, "Event stream open");
                    self.failures = 0;
                }
                StreamSignal::Event { connection, event } if self.is_current(connection) => {
                    self.failures = 0;
                    return Some(event);
                }
                StreamSignal::Failed { connection, reason } if self.is_current(connection) => {
                    self.handle_failure(&reason);
                }
                StreamSignal::RetryDue => self.retry_due(),
                stale => trace!(?stale, "Dropping signal from a closed connection"),
            }
        }
        None
    }

    /// Close the connection and cancel any pending retry
    pub fn shutdown(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
        if self.state != ConnectionState::Stopped {
            info!(connections = self.connection, "Event stream supervisor shut down");
        }
        self.set_state(ConnectionState::Stopped);
    }

    fn is_current(&self, connection: u64) -> bool {
        self.handle.is_some() && connection == self.connection
    }

    fn handle_failure(&mut self, reason: &str) {
        self.failures = self.failures.saturating_add(1);
        let attempt = self.failures;
        warn!(connection = self.connection, attempt, reason = %reason, "Event stream lost");

        let give_up = self.policy.max_retries.is_some_and(|max| attempt > max);
        if give_up {
            self.notices.error(notice::STREAM_STOPPED);
        } else {
            self.notices.error(notice::RECONNECTING);
        }

        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }

        if give_up {
            warn!(attempt, "Giving up on event stream");
            self.set_state(ConnectionState::Stopped);
            return;
        }

        self.schedule_retry(attempt);
    }

    fn schedule_retry(&mut self, attempt: u32) {
        let delay = self.policy.delay_for(attempt);
        let tx = self.tx.clone();

        if let Some(previous) = self.retry.take() {
            previous.abort();
        }
        self.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(StreamSignal::RetryDue);
        }));
        self.retries_scheduled += 1;

        info!(attempt, delay_ms = delay.as_millis() as u64, "Event stream reconnect scheduled");
        self.set_state(ConnectionState::AwaitingRetry { attempt });
    }

    fn retry_due(&mut self) {
        self.retry = None;
        if let ConnectionState::AwaitingRetry { attempt } = self.state {
            info!(attempt, "Reconnecting event stream");
            self.set_state(ConnectionState::Idle);
            self.start();
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }
}

impl Drop for ReconnectSupervisor {
    fn drop(&mut self) {
        // StreamHandle closes itself on drop; the timer task does not
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
    }
}
