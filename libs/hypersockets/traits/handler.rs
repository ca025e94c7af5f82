//! Sequential message handling
//!
//! ```text
//! WebSocket → Parser (I/O task, arrival order) → Channel → Handler thread
//! ```
//!
//! There is exactly one handler per client. It runs on a dedicated OS thread
//! and sees messages strictly in the order the socket delivered them, which
//! keeps all state mutation on a single writer.

use crate::Result;
use std::fmt::Debug;

/// Processes parsed messages one at a time on the handler thread
///
/// # Example
///
/// ```ignore
/// struct CountingHandler {
///     seen: Arc<AtomicU64>,
/// }
///
/// impl MessageHandler<WsMessage> for CountingHandler {
///     fn handle(&mut self, _message: WsMessage) -> Result<()> {
///         self.seen.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }
/// }
/// ```
pub trait MessageHandler<M>: Send + 'static
where
    M: Send + Debug + 'static,
{
    /// Handle a parsed message
    ///
    /// Runs on a plain OS thread, not inside the async runtime. An error is
    /// logged and the thread moves on to the next message.
    fn handle(&mut self, message: M) -> Result<()>;
}

impl<M, F> MessageHandler<M> for F
where
    M: Send + Debug + 'static,
    F: FnMut(M) -> Result<()> + Send + 'static,
{
    fn handle(&mut self, message: M) -> Result<()> {
        self(message)
    }
}
