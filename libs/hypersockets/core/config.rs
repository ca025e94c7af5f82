use crate::traits::*;
use parking_lot::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on how long a connection attempt may take to reach "open"
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a supervised WebSocket client
///
/// Built with the type-state builder; the client task owns it behind an `Arc`.
pub struct ClientConfig<M>
where
    M: Send + std::fmt::Debug + 'static,
{
    /// WebSocket URL (wss:// or ws://)
    pub(crate) url: String,

    /// Frame parser, run on the I/O task in arrival order
    pub(crate) parser: Arc<dyn MessageParser<Message = M>>,

    /// Optional heartbeat configuration (interval, payload)
    pub(crate) heartbeat: Option<(Duration, WsMessage)>,

    /// Upper bound for a connection attempt to reach "open"
    pub(crate) connect_timeout: Duration,

    /// Subscription frame sent after every successful open
    ///
    /// Replaced in place on resubscribe so a reconnect always carries the
    /// latest interest set.
    pub(crate) subscription: Arc<RwLock<Option<WsMessage>>>,

    /// Running flag - once false, every callback becomes a no-op and no
    /// further work is scheduled
    pub(crate) running: Arc<AtomicBool>,
}

impl<M> ClientConfig<M>
where
    M: Send + std::fmt::Debug + 'static,
{
    /// Get a reference to the URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Check if heartbeat is configured
    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat.is_some()
    }

    /// Connection attempt timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Current subscription frame, if any
    pub fn subscription(&self) -> Option<WsMessage> {
        self.subscription.read().clone()
    }
}
