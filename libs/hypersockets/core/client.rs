use crate::config::ClientConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::heartbeat::{next_beat, Heartbeat};
use crate::supervisor::{CloseKind, Supervisor, Transition};
use crate::traits::*;
use crossbeam_channel::{Receiver, Sender};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;

/// Internal command messages for client control
#[derive(Debug)]
enum ClientCommand {
    /// Send a message to the WebSocket
    Send(WsMessage),
    /// Re-send the (already replaced) subscription frame on the open socket
    Resubscribe,
    /// Manual retry: reset the retry counter and connect now
    Retry,
    /// Shutdown the client
    Shutdown,
}

/// Lifecycle notifications emitted by the client task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A connection attempt started
    Connecting,
    /// Connected to the server
    Connected,
    /// Clean close; no automatic reconnect
    Disconnected,
    /// Abnormal close; reconnect scheduled after `delay`
    Reconnecting { attempt: usize, delay: Duration },
    /// Retry ceiling exceeded; waiting for a manual retry
    Failed { attempts: usize },
    /// Transport error detail (informational)
    Error(String),
}

/// Client metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub parse_errors: u64,
    pub connection_state: ConnectionState,
}

/// How one connected session ended
enum SessionEnd {
    Closed(CloseKind),
    Shutdown,
}

/// What woke a disconnected client
enum Wake {
    Timer,
    ManualRetry,
    Shutdown,
}

/// Supervised WebSocket client
///
/// One tokio task owns the socket and drives connect, subscribe, heartbeat,
/// connect timeout and retry timers. Frames are parsed on that task in
/// arrival order and dispatched to a single handler thread, so handlers
/// observe the feed strictly in order and all mutation has one writer.
///
/// # Type Parameters
/// - `M`: Message type produced by the parser
pub struct WebSocketClient<M>
where
    M: Send + std::fmt::Debug + 'static,
{
    config: Arc<ClientConfig<M>>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    event_rx: Receiver<ClientEvent>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
    handler_handle: Option<std::thread::JoinHandle<()>>,
}

impl<M> WebSocketClient<M>
where
    M: Send + std::fmt::Debug + 'static,
{
    /// Spawn the I/O task. Called by the builder's `build()`.
    pub(crate) fn new(
        config: ClientConfig<M>,
        strategy: Box<dyn ReconnectionStrategy>,
        dispatch_tx: Sender<M>,
        handler_handle: std::thread::JoinHandle<()>,
    ) -> Self {
        let config = Arc::new(config);
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));
        let metrics = Arc::new(AtomicMetrics::new());

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        let supervisor = Supervisor::new(Arc::clone(&state), strategy);

        let task_handle = {
            let config = Arc::clone(&config);
            let metrics = Arc::clone(&metrics);

            tokio::spawn(async move {
                run_client(config, supervisor, metrics, command_rx, event_tx, dispatch_tx).await;
            })
        };

        Self {
            config,
            state,
            metrics,
            command_tx,
            event_rx,
            task_handle: Some(task_handle),
            handler_handle: Some(handler_handle),
        }
    }

    /// Send a message through the WebSocket
    ///
    /// Messages sent while disconnected are dropped.
    pub fn send(&self, message: WsMessage) -> Result<()> {
        self.command(ClientCommand::Send(message))
    }

    /// Replace the subscription frame and send it on the open socket
    ///
    /// The new frame is also what every later reconnect sends, so the
    /// interest set survives connection loss.
    pub fn resubscribe(&self, subscription: WsMessage) -> Result<()> {
        *self.config.subscription.write() = Some(subscription);
        self.command(ClientCommand::Resubscribe)
    }

    /// Manual retry: reset the retry counter and reconnect immediately
    ///
    /// Ignored while connected.
    pub fn retry(&self) -> Result<()> {
        self.command(ClientCommand::Retry)
    }

    fn command(&self, command: ClientCommand) -> Result<()> {
        if !self.config.running.load(Ordering::Acquire) {
            return Err(HyperSocketError::InvalidState("client is shut down".into()));
        }
        self.command_tx
            .send(command)
            .map_err(|e| HyperSocketError::ChannelSend(e.to_string()))
    }

    /// Get current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Check if connected
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.metrics.messages_sent(),
            messages_received: self.metrics.messages_received(),
            reconnect_count: self.metrics.reconnect_count(),
            parse_errors: self.metrics.parse_errors(),
            connection_state: self.state.get(),
        }
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event, waiting at most `timeout`
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ClientEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Shutdown the client and wait for its task and handler thread
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down WebSocket client");

        self.config.running.store(false, Ordering::Release);
        let _ = self.command_tx.send(ClientCommand::Shutdown);

        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                error!("Client task ended abnormally: {}", e);
            }
        }

        // The dispatch sender died with the task, so the handler drains and exits
        if let Some(handle) = self.handler_handle.take() {
            let joined = tokio::task::spawn_blocking(move || handle.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                error!("Handler thread panicked");
            }
        }

        info!("WebSocket client shut down");
        Ok(())
    }
}

impl<M> Drop for WebSocketClient<M>
where
    M: Send + std::fmt::Debug + 'static,
{
    fn drop(&mut self) {
        if self.task_handle.is_some() {
            self.config.running.store(false, Ordering::Release);
            let _ = self.command_tx.send(ClientCommand::Shutdown);
        }
    }
}

#[inline]
fn is_running(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Acquire)
}

/// Main client task loop
async fn run_client<M>(
    config: Arc<ClientConfig<M>>,
    mut supervisor: Supervisor,
    metrics: Arc<AtomicMetrics>,
    mut command_rx: mpsc::UnboundedReceiver<ClientCommand>,
    event_tx: Sender<ClientEvent>,
    dispatch_tx: Sender<M>,
) where
    M: Send + std::fmt::Debug + 'static,
{
    let running = &config.running;

    loop {
        if !is_running(running) || !supervisor.begin_attempt() {
            break;
        }
        let _ = event_tx.send(ClientEvent::Connecting);

        let end = match connect(&config).await {
            Ok(ws_stream) => {
                if !is_running(running) {
                    break;
                }
                supervisor.on_open();
                info!("Connected to {}", config.url);
                let _ = event_tx.send(ClientEvent::Connected);

                handle_connection(ws_stream, &config, &metrics, &mut command_rx, &dispatch_tx).await
            }
            Err(e) => {
                warn!("Connection attempt failed: {}", e);
                let _ = event_tx.send(ClientEvent::Error(e.to_string()));
                SessionEnd::Closed(CloseKind::Abnormal)
            }
        };

        let kind = match end {
            SessionEnd::Shutdown => break,
            SessionEnd::Closed(kind) => kind,
        };

        if !is_running(running) {
            break;
        }

        let wake = match supervisor.on_close(kind) {
            Transition::Reconnect { attempt, delay } => {
                info!("Reconnecting in {:?} (attempt {})", delay, attempt);
                metrics.increment_reconnects();
                let _ = event_tx.send(ClientEvent::Reconnecting { attempt, delay });
                wait_for_wake(&mut command_rx, Some(delay)).await
            }
            Transition::Failed { attempts } => {
                error!("Giving up after {} reconnect attempts", attempts);
                let _ = event_tx.send(ClientEvent::Failed { attempts });
                wait_for_wake(&mut command_rx, None).await
            }
            Transition::Idle => {
                info!("Disconnected from {}", config.url);
                let _ = event_tx.send(ClientEvent::Disconnected);
                wait_for_wake(&mut command_rx, None).await
            }
        };

        match wake {
            Wake::Timer => {}
            Wake::ManualRetry => {
                info!("Manual retry requested");
                supervisor.manual_retry();
            }
            Wake::Shutdown => break,
        }
    }

    supervisor.stop();
    info!("Client task exiting");
}

/// Open the socket, bounded by the configured connect timeout
///
/// On timeout the pending handshake future is dropped, which closes the
/// half-open TCP stream.
async fn connect<M>(config: &ClientConfig<M>) -> Result<WsStream>
where
    M: Send + std::fmt::Debug + 'static,
{
    debug!("Connecting to {}", config.url);
    match tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str())).await {
        Ok(Ok((stream, _))) => Ok(stream),
        Ok(Err(e)) => Err(HyperSocketError::WebSocket(e.to_string())),
        Err(_) => Err(HyperSocketError::Timeout(format!(
            "connection to {} not open after {:?}",
            config.url, config.connect_timeout
        ))),
    }
}

/// Sleep until the retry timer fires or a command arrives
async fn wait_for_wake(
    command_rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
    delay: Option<Duration>,
) -> Wake {
    let timer = async {
        match delay {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(timer);

    loop {
        tokio::select! {
            _ = &mut timer => return Wake::Timer,
            cmd = command_rx.recv() => match cmd {
                Some(ClientCommand::Retry) => return Wake::ManualRetry,
                Some(ClientCommand::Shutdown) | None => return Wake::Shutdown,
                Some(ClientCommand::Send(_)) => {
                    debug!("Dropping outbound message while disconnected");
                }
                Some(ClientCommand::Resubscribe) => {
                    debug!("Subscription updated, will be sent on next open");
                }
            },
        }
    }
}

/// Drive one open connection until it closes or shutdown is requested
async fn handle_connection<M>(
    ws_stream: WsStream,
    config: &ClientConfig<M>,
    metrics: &AtomicMetrics,
    command_rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
    dispatch_tx: &Sender<M>,
) -> SessionEnd
where
    M: Send + std::fmt::Debug + 'static,
{
    let (mut write, mut read) = ws_stream.split();

    if let Some(subscription) = config.subscription() {
        if let Err(e) = send_frame(&mut write, &subscription, metrics).await {
            warn!("Failed to send subscription: {}", e);
            return SessionEnd::Closed(CloseKind::Abnormal);
        }
        debug!("Sent subscription message");
    }

    let mut heartbeat = config
        .heartbeat
        .as_ref()
        .map(|(interval, payload)| Heartbeat::new(*interval, payload.clone()));

    loop {
        if !is_running(&config.running) {
            close_normally(&mut write).await;
            return SessionEnd::Shutdown;
        }

        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Close(frame))) => {
                    let kind = classify_close(frame.as_ref());
                    info!("Server closed connection ({:?}): {:?}", kind, frame);
                    return SessionEnd::Closed(kind);
                }
                Some(Ok(msg)) => {
                    metrics.increment_received();
                    if let Some(ws_msg) = tungstenite_to_ws_message(msg) {
                        dispatch(config, &ws_msg, metrics, dispatch_tx);
                    }
                }
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    return SessionEnd::Closed(CloseKind::Abnormal);
                }
                None => {
                    warn!("WebSocket stream ended without a close frame");
                    return SessionEnd::Closed(CloseKind::Abnormal);
                }
            },

            cmd = command_rx.recv() => match cmd {
                Some(ClientCommand::Send(msg)) => {
                    if let Err(e) = send_frame(&mut write, &msg, metrics).await {
                        warn!("Failed to send message: {}", e);
                        return SessionEnd::Closed(CloseKind::Abnormal);
                    }
                }
                Some(ClientCommand::Resubscribe) => {
                    if let Some(subscription) = config.subscription() {
                        if let Err(e) = send_frame(&mut write, &subscription, metrics).await {
                            warn!("Failed to resubscribe: {}", e);
                            return SessionEnd::Closed(CloseKind::Abnormal);
                        }
                        info!("Resubscribed on open connection");
                    }
                }
                Some(ClientCommand::Retry) => {
                    debug!("Already connected, ignoring manual retry");
                }
                Some(ClientCommand::Shutdown) | None => {
                    info!("Received shutdown command");
                    close_normally(&mut write).await;
                    return SessionEnd::Shutdown;
                }
            },

            payload = next_beat(&mut heartbeat) => {
                if let Err(e) = send_frame(&mut write, &payload, metrics).await {
                    warn!("Failed to send heartbeat: {}", e);
                    return SessionEnd::Closed(CloseKind::Abnormal);
                }
                debug!("Heartbeat sent");
            }
        }
    }
}

/// Parse one frame and hand the result to the handler thread
fn dispatch<M>(config: &ClientConfig<M>, frame: &WsMessage, metrics: &AtomicMetrics, tx: &Sender<M>)
where
    M: Send + std::fmt::Debug + 'static,
{
    if !is_running(&config.running) {
        return;
    }

    match config.parser.parse(frame) {
        Ok(Some(message)) => {
            if tx.send(message).is_err() {
                debug!("Handler channel closed, dropping message");
            }
        }
        Ok(None) => {}
        Err(e) => {
            metrics.increment_parse_errors();
            warn!("Dropping malformed frame: {}", e);
        }
    }
}

async fn send_frame(write: &mut WsSink, message: &WsMessage, metrics: &AtomicMetrics) -> Result<()> {
    write
        .send(ws_message_to_tungstenite(message))
        .await
        .map_err(|e| HyperSocketError::WebSocket(e.to_string()))?;
    metrics.increment_sent();
    Ok(())
}

async fn close_normally(write: &mut WsSink) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "client shutdown".into(),
    };
    let _ = write.send(Message::Close(Some(frame))).await;
    let _ = write.close().await;
}

/// Only a normal-closure code counts as a clean close
pub(crate) fn classify_close(frame: Option<&CloseFrame<'_>>) -> CloseKind {
    match frame {
        Some(f) if f.code == CloseCode::Normal => CloseKind::Clean,
        _ => CloseKind::Abnormal,
    }
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(msg: &WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text.clone()),
        WsMessage::Binary(data) => Message::Binary(data.clone()),
    }
}

/// Convert tungstenite Message to WsMessage
fn tungstenite_to_ws_message(msg: Message) -> Option<WsMessage> {
    match msg {
        Message::Text(text) => Some(WsMessage::Text(text)),
        Message::Binary(data) => Some(WsMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}
