//! Connection lifecycle state machine
//!
//! The supervisor owns the retry counter and every [`ConnectionState`]
//! transition. It performs no I/O: the client's I/O task reports what
//! happened (attempt started, socket opened, socket closed) and receives a
//! [`Transition`] telling it what to do next. Keeping the decisions here
//! lets the retry policy be exercised without a socket.

use crate::connection_state::{AtomicConnectionState, ConnectionState};
use crate::traits::ReconnectionStrategy;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a connection (or connection attempt) ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Server sent a normal closure (code 1000)
    Clean,
    /// Open error, connect timeout, transport error, or a non-normal close code
    Abnormal,
}

/// What the I/O task must do after a close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Wait `delay`, then attempt to connect again
    Reconnect { attempt: usize, delay: Duration },
    /// Retry ceiling exceeded; wait for a manual retry
    Failed { attempts: usize },
    /// Clean close or stopped supervisor; wait for a manual retry
    Idle,
}

/// Retry/backoff state machine for one connection
pub struct Supervisor {
    state: Arc<AtomicConnectionState>,
    strategy: Box<dyn ReconnectionStrategy>,
    retry_count: usize,
    stopped: bool,
}

impl Supervisor {
    pub fn new(state: Arc<AtomicConnectionState>, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        Self {
            state,
            strategy,
            retry_count: 0,
            stopped: false,
        }
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Consecutive abnormal closes retried since the last successful open
    #[inline]
    pub fn retry_count(&self) -> usize {
        self.retry_count
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// A connection attempt is starting
    ///
    /// Returns false if the supervisor has been stopped and no attempt may start.
    pub fn begin_attempt(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.state.set(ConnectionState::Connecting);
        true
    }

    /// The socket reached "open"
    pub fn on_open(&mut self) {
        if self.stopped {
            return;
        }
        if self.retry_count > 0 {
            info!("Connection restored after {} retries", self.retry_count);
        }
        self.retry_count = 0;
        self.state.set(ConnectionState::Connected);
    }

    /// The connection or the attempt ended
    pub fn on_close(&mut self, kind: CloseKind) -> Transition {
        if self.stopped {
            return Transition::Idle;
        }

        match kind {
            CloseKind::Clean => {
                debug!("Clean close, not retrying");
                self.state.set(ConnectionState::Disconnected);
                Transition::Idle
            }
            CloseKind::Abnormal => match self.strategy.next_delay(self.retry_count) {
                Some(delay) => {
                    self.retry_count += 1;
                    self.state.set(ConnectionState::Retrying);
                    Transition::Reconnect {
                        attempt: self.retry_count,
                        delay,
                    }
                }
                None => {
                    warn!(
                        "Retry ceiling reached after {} attempts, giving up",
                        self.retry_count
                    );
                    self.state.set(ConnectionState::Failed);
                    Transition::Failed {
                        attempts: self.retry_count,
                    }
                }
            },
        }
    }

    /// Operator-requested retry: resets the counter
    ///
    /// Returns false if the supervisor has been stopped.
    pub fn manual_retry(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.retry_count = 0;
        true
    }

    /// Stop supervising; every later report becomes a no-op
    pub fn stop(&mut self) {
        self.stopped = true;
        self.state.set(ConnectionState::Disconnected);
    }
}
