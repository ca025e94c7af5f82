pub mod states;

use crate::client::WebSocketClient;
use crate::config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT};
use crate::traits::*;
use parking_lot::RwLock;
use states::*;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Poll period of the handler thread while its channel is idle
const HANDLER_POLL: Duration = Duration::from_millis(50);

/// Type-state builder for WebSocketClient
///
/// This builder uses Rust's type system to enforce that required
/// fields (URL and parser/handler pipeline) are set before the client
/// can be built.
pub struct WebSocketClientBuilder<U, P, M>
where
    U: UrlState,
    P: PipelineState,
    M: Send + Debug + 'static,
{
    _state: TypeState<U, P>,
    url: Option<String>,
    parser: Option<Arc<dyn MessageParser<Message = M>>>,
    handler: Option<Box<dyn MessageHandler<M>>>,
    heartbeat: Option<(Duration, WsMessage)>,
    connect_timeout: Duration,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    subscription: Option<WsMessage>,
}

impl WebSocketClientBuilder<NoUrl, NoPipeline, ()> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            url: None,
            parser: None,
            handler: None,
            heartbeat: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_strategy: None,
            subscription: None,
        }
    }
}

impl Default for WebSocketClientBuilder<NoUrl, NoPipeline, ()> {
    fn default() -> Self {
        Self::new()
    }
}

// URL setting
impl<P, M> WebSocketClientBuilder<NoUrl, P, M>
where
    P: PipelineState,
    M: Send + Debug + 'static,
{
    pub fn url(self, url: impl Into<String>) -> WebSocketClientBuilder<HasUrl, P, M> {
        WebSocketClientBuilder {
            _state: TypeState::new(),
            url: Some(url.into()),
            parser: self.parser,
            handler: self.handler,
            heartbeat: self.heartbeat,
            connect_timeout: self.connect_timeout,
            reconnect_strategy: self.reconnect_strategy,
            subscription: self.subscription,
        }
    }
}

// Pipeline setting
impl<U> WebSocketClientBuilder<U, NoPipeline, ()>
where
    U: UrlState,
{
    /// Set the parser and the single handler its messages are delivered to
    pub fn pipeline<Pa, H>(
        self,
        parser: Pa,
        handler: H,
    ) -> WebSocketClientBuilder<U, HasPipeline, Pa::Message>
    where
        Pa: MessageParser,
        H: MessageHandler<Pa::Message>,
    {
        WebSocketClientBuilder {
            _state: TypeState::new(),
            url: self.url,
            parser: Some(Arc::new(parser)),
            handler: Some(Box::new(handler)),
            heartbeat: self.heartbeat,
            connect_timeout: self.connect_timeout,
            reconnect_strategy: self.reconnect_strategy,
            subscription: self.subscription,
        }
    }
}

// Optional configuration methods
impl<U, P, M> WebSocketClientBuilder<U, P, M>
where
    U: UrlState,
    P: PipelineState,
    M: Send + Debug + 'static,
{
    /// Send `payload` every `interval` while connected
    pub fn heartbeat(mut self, interval: Duration, payload: WsMessage) -> Self {
        self.heartbeat = Some((interval, payload));
        self
    }

    /// Bound on how long a connection attempt may take to reach "open"
    ///
    /// An attempt that exceeds it is force-closed and counted as an
    /// abnormal close.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Frame sent after every successful open
    pub fn subscription(mut self, message: WsMessage) -> Self {
        self.subscription = Some(message);
        self
    }
}

// Build method - only available when all required fields are set
impl<M> WebSocketClientBuilder<HasUrl, HasPipeline, M>
where
    M: Send + Debug + 'static,
{
    pub async fn build(self) -> Result<WebSocketClient<M>> {
        let url = self
            .url
            .ok_or_else(|| HyperSocketError::Configuration("URL must be set".into()))?;
        let parser = self
            .parser
            .ok_or_else(|| HyperSocketError::Configuration("parser must be set".into()))?;
        let handler = self
            .handler
            .ok_or_else(|| HyperSocketError::Configuration("handler must be set".into()))?;

        if self.connect_timeout.is_zero() {
            return Err(HyperSocketError::Configuration(
                "connect timeout must be greater than zero".into(),
            ));
        }
        if let Some((interval, _)) = &self.heartbeat {
            if interval.is_zero() {
                return Err(HyperSocketError::Configuration(
                    "heartbeat interval must be greater than zero".into(),
                ));
            }
        }

        let running = Arc::new(AtomicBool::new(true));

        let reconnect_strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(ExponentialBackoff::feed_default()));

        let (dispatch_tx, dispatch_rx) = crossbeam_channel::unbounded();
        let handler_handle = spawn_handler_thread(handler, dispatch_rx, Arc::clone(&running))?;

        let config = ClientConfig {
            url,
            parser,
            heartbeat: self.heartbeat,
            connect_timeout: self.connect_timeout,
            subscription: Arc::new(RwLock::new(self.subscription)),
            running,
        };

        Ok(WebSocketClient::new(config, reconnect_strategy, dispatch_tx, handler_handle))
    }
}

fn spawn_handler_thread<M>(
    mut handler: Box<dyn MessageHandler<M>>,
    receiver: crossbeam_channel::Receiver<M>,
    running: Arc<AtomicBool>,
) -> Result<std::thread::JoinHandle<()>>
where
    M: Send + Debug + 'static,
{
    std::thread::Builder::new()
        .name("hypersockets-handler".into())
        .spawn(move || loop {
            match receiver.recv_timeout(HANDLER_POLL) {
                Ok(message) => {
                    if !running.load(Ordering::Acquire) {
                        continue;
                    }
                    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(message))) {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::error!("Handler error: {}", e),
                        Err(_) => tracing::error!("Handler panicked, continuing with next message"),
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    if !running.load(Ordering::Acquire) {
                        tracing::debug!("Running flag cleared, handler thread exiting");
                        break;
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    tracing::debug!("Handler channel closed, thread exiting");
                    break;
                }
            }
        })
        .map_err(|e| HyperSocketError::Configuration(format!("failed to spawn handler thread: {}", e)))
}
