//! Common test utilities for book sync integration tests

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

#[derive(Debug, Clone)]
enum Action {
    Send(String),
    Close(CloseCode),
}

/// Mock market channel
///
/// Records text frames from the client, answers "PING" with "PONG" and
/// pushes scripted frames to every open connection.
pub struct MockFeed {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    actions: broadcast::Sender<Action>,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

impl MockFeed {
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
                            let Ok((stream, _)) = result else { break };
                            let rx = actions.subscribe();
                            let received = received.clone();
                            let connections = connections.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                Self::serve(stream, rx, received, connections, shutdown).await;
                            });
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

    async fn serve(
        stream: tokio::net::TcpStream,
        mut actions: broadcast::Receiver<Action>,
        received: Arc<Mutex<Vec<String>>>,
        connections: Arc<AtomicUsize>,
        shutdown: Arc<Notify>,
    ) {
        let Ok(ws_stream) = accept_async(stream).await else {
            return;
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
                        Ok(Action::Send(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Ok(Action::Close(code)) => {
                            let frame = CloseFrame { code, reason: "scripted".into() };
                            let _ = write.send(Message::Close(Some(frame))).await;
                            break;
                        }
                        Err(_) => break,
                    }
                }
                _ = shutdown.notified() => break,
            }
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn push(&self, text: impl Into<String>) {
        let _ = self.actions.send(Action::Send(text.into()));
    }

    pub fn close_with(&self, code: CloseCode) {
        let _ = self.actions.send(Action::Close(code));
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Number of subscribe frames mentioning `asset_id`
    pub fn subscriptions_for(&self, asset_id: &str) -> usize {
        self.received
            .lock()
            .iter()
            .filter(|t| t.contains("assets_ids") && t.contains(asset_id))
            .count()
    }
}

impl Drop for MockFeed {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
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

/// Minimal HTTP endpoint answering every request with one JSON body
///
/// Records "<request line>\n<body>" for each request it served.
pub struct RestStub {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl RestStub {
    pub async fn start(body: &str) -> Self {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let body = body.to_string();

        {
            let requests = requests.clone();
            tokio::spawn(async move {
                while let Ok((mut stream, _)) = listener.accept().await {
                    let mut raw = Vec::new();
                    let mut buf = [0u8; 4096];

                    // Read headers, then Content-Length bytes of body
                    let (head_len, content_length) = loop {
                        let n = match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => break (None, 0),
                            Ok(n) => n,
                        };
                        raw.extend_from_slice(&buf[..n]);
                        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                            let head = String::from_utf8_lossy(&raw[..pos]).to_lowercase();
                            let length = head
                                .lines()
                                .find_map(|l| l.strip_prefix("content-length:"))
                                .and_then(|v| v.trim().parse::<usize>().ok())
                                .unwrap_or(0);
                            break (Some(pos + 4), length);
                        }
                    };
                    let Some(head_len) = head_len else { continue };

                    while raw.len() < head_len + content_length {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => raw.extend_from_slice(&buf[..n]),
                        }
                    }

                    let text = String::from_utf8_lossy(&raw).to_string();
                    let request_line = text.lines().next().unwrap_or_default().to_string();
                    let request_body = text[head_len.min(text.len())..].to_string();
                    requests.lock().push(format!("{}\n{}", request_line, request_body));

                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                }
            });
        }

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

/// A ws:// URL nothing listens on
pub async fn refused_ws_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}", addr)
}
