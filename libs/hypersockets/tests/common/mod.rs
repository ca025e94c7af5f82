//! Common test utilities for HyperSockets integration tests
//!
//! Provides a scriptable mock feed server and a listener that never completes
//! the WebSocket handshake.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Scripted action applied to every live server-side connection
#[derive(Debug, Clone)]
pub enum ServerAction {
    Send(String),
    Close(CloseCode),
    /// Drop the TCP stream without a close frame
    Drop,
}

/// A mock WebSocket feed server for testing
///
/// Records every text frame it receives, answers "PING" with "PONG" and
/// applies scripted actions to the connections that are open at the time.
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    actions: broadcast::Sender<ServerAction>,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let (actions, _) = broadcast::channel(256);
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        {
            let shutdown = shutdown.clone();
            let actions = actions.clone();
            let received = received.clone();
            let connections = connections.clone();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        result = listener.accept() => {
                            match result {
                                Ok((stream, _)) => {
                                    let rx = actions.subscribe();
                                    let received = received.clone();
                                    let connections = connections.clone();
                                    let shutdown = shutdown.clone();
                                    tokio::spawn(async move {
                                        Self::handle_connection(stream, rx, received, connections, shutdown).await;
                                    });
                                }
                                Err(e) => {
                                    eprintln!("Accept error: {}", e);
                                    break;
                                }
                            }
                        }
                        _ = shutdown.notified() => break,
                    }
                }
            });
        }

        Self {
            addr,
            shutdown,
            actions,
            received,
            connections,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        mut actions: broadcast::Receiver<ServerAction>,
        received: Arc<Mutex<Vec<String>>>,
        connections: Arc<AtomicUsize>,
        shutdown: Arc<Notify>,
    ) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };
        connections.fetch_add(1, Ordering::SeqCst);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let is_ping = text == "PING";
                            received.lock().push(text);
                            if is_ping && write.send(Message::Text("PONG".into())).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                action = actions.recv() => {
                    match action {
                        Ok(ServerAction::Send(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Ok(ServerAction::Close(code)) => {
                            let frame = CloseFrame { code, reason: "scripted".into() };
                            let _ = write.send(Message::Close(Some(frame))).await;
                            break;
                        }
                        Ok(ServerAction::Drop) | Err(_) => break,
                    }
                }
                _ = shutdown.notified() => break,
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Push a text frame to every open connection
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.actions.send(ServerAction::Send(text.into()));
    }

    /// Close every open connection with `code`
    pub fn close_with(&self, code: CloseCode) {
        let _ = self.actions.send(ServerAction::Close(code));
    }

    /// Drop every open connection without a close frame
    pub fn drop_connections(&self) {
        let _ = self.actions.send(ServerAction::Drop);
    }

    /// Text frames received so far, across all connections
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Number of completed handshakes
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` handshakes completed
    pub async fn wait_for_connections(&self, n: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.connection_count() >= n).await
    }

    /// Wait until `count` received frames equal `text`
    pub async fn wait_for_received(&self, text: &str, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || {
            self.received.lock().iter().filter(|t| t.as_str() == text).count() >= count
        })
        .await
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Accepts TCP connections and never answers the WebSocket handshake
///
/// Returns the ws:// URL. The listener lives as long as the runtime.
pub async fn silent_listener() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    format!("ws://{}", addr)
}

/// Test fixture for connection states
pub mod fixtures {
    use hypersockets::core::connection_state::{AtomicConnectionState, ConnectionState};
    use std::sync::Arc;

    pub fn disconnected_state() -> Arc<AtomicConnectionState> {
        Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected))
    }
}
