//! Heartbeat timer for WebSocket connections
//!
//! The feed does not acknowledge keepalives at the application level, so a
//! heartbeat is only filler: on every tick the message loop writes the
//! configured payload to keep idle-timeouts at bay. Liveness is judged by
//! the socket staying open.
//!
//! ```text
//! message loop select! {
//!     frame  = read.next()        → parse → handler channel
//!     cmd    = commands.recv()    → send / resubscribe / shutdown
//!     _      = heartbeat.tick()   → write payload
//! }
//! ```
//!
//! One `Heartbeat` is created per connection and dropped with it, so a
//! reconnect never inherits a stale timer.

use crate::traits::WsMessage;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;

/// Periodic keepalive payload source
pub struct Heartbeat {
    ticker: Interval,
    payload: WsMessage,
}

impl Heartbeat {
    /// Create a heartbeat whose first tick fires one full `period` from now
    pub fn new(period: Duration, payload: WsMessage) -> Self {
        let mut ticker = interval(period);
        // Skip missed ticks rather than bursting after a slow write
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Consume the immediate first tick
        ticker.reset();
        debug!("Heartbeat armed with interval: {:?}", period);
        Self { ticker, payload }
    }

    /// Wait for the next tick and return the payload to send
    pub async fn tick(&mut self) -> WsMessage {
        self.ticker.tick().await;
        self.payload.clone()
    }
}

/// Wait on an optional heartbeat; pends forever when none is configured
pub async fn next_beat(heartbeat: &mut Option<Heartbeat>) -> WsMessage {
    match heartbeat {
        Some(hb) => hb.tick().await,
        None => std::future::pending().await,
    }
}
