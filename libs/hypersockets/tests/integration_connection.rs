//! Integration tests for the supervised connection lifecycle
//!
//! These tests run the real client against a local mock feed server and
//! verify subscribe-on-open, close classification, reconnection and
//! shutdown.

mod common;

use common::{silent_listener, MockWsServer};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use hypersockets::*;
use std::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

const WAIT: Duration = Duration::from_secs(5);
const SUBSCRIBE: &str = r#"{"assets_ids":["1"],"type":"market"}"#;

/// Passes text frames through, filters "PONG", rejects frames starting with "bad"
struct LineParser;

impl MessageParser for LineParser {
    type Message = String;

    fn parse(&self, message: &WsMessage) -> Result<Option<String>> {
        match message.as_text() {
            Some("PONG") => Ok(None),
            Some(text) if text.starts_with("bad") => {
                Err(HyperSocketError::Parse(format!("rejected: {}", text)))
            }
            Some(text) => Ok(Some(text.to_string())),
            None => Ok(None),
        }
    }
}

async fn build_client(
    url: String,
    strategy: ExponentialBackoff,
    heartbeat: Option<Duration>,
) -> (WebSocketClient<String>, Receiver<String>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let handler = move |msg: String| {
        tx.send(msg)
            .map_err(|e| HyperSocketError::ChannelSend(e.to_string()))
    };

    let mut builder = hypersockets::builder()
        .url(url)
        .pipeline(LineParser, handler)
        .connect_timeout(Duration::from_millis(300))
        .reconnect_strategy(strategy)
        .subscription(WsMessage::Text(SUBSCRIBE.into()));

    if let Some(interval) = heartbeat {
        builder = builder.heartbeat(interval, WsMessage::Text("PING".into()));
    }

    (builder.build().await.unwrap(), rx)
}

fn fast_backoff(max_attempts: Option<usize>) -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(50),
        Duration::from_millis(200),
        max_attempts,
    )
}

/// Wait for the first event matching `pred`, returning it
async fn wait_for_event(
    client: &WebSocketClient<String>,
    mut pred: impl FnMut(&ClientEvent) -> bool,
) -> Option<ClientEvent> {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        while let Some(event) = client.try_recv_event() {
            verbose_println!("  event: {:?}", event);
            if pred(&event) {
                return Some(event);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

/// An address nothing listens on
async fn refused_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}", addr)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connects_subscribes_and_delivers_in_order() {
    let server = MockWsServer::start().await;
    let (client, rx) = build_client(server.ws_url(), fast_backoff(Some(3)), None).await;

    assert!(wait_for_event(&client, |e| *e == ClientEvent::Connected).await.is_some());
    assert!(server.wait_for_received(SUBSCRIBE, 1, WAIT).await);
    assert_eq!(client.connection_state(), ConnectionState::Connected);

    for i in 0..100 {
        server.push_text(format!("msg-{}", i));
    }

    for i in 0..100 {
        let msg = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(msg, format!("msg-{}", i));
    }

    let metrics = client.metrics();
    assert_eq!(metrics.messages_received, 100);
    assert!(metrics.messages_sent >= 1);

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handler_panic_does_not_stop_delivery() {
    let server = MockWsServer::start().await;
    let (tx, rx) = crossbeam_channel::unbounded();
    let handler = move |msg: String| -> Result<()> {
        if msg == "explode" {
            panic!("handler bug");
        }
        tx.send(msg)
            .map_err(|e| HyperSocketError::ChannelSend(e.to_string()))
    };

    let client = hypersockets::builder()
        .url(server.ws_url())
        .pipeline(LineParser, handler)
        .reconnect_strategy(fast_backoff(Some(3)))
        .build()
        .await
        .unwrap();

    assert!(server.wait_for_connections(1, WAIT).await);
    assert!(wait_for_event(&client, |e| *e == ClientEvent::Connected).await.is_some());

    server.push_text("before");
    server.push_text("explode");
    server.push_text("after");

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), "before");
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), "after");
    assert_eq!(client.connection_state(), ConnectionState::Connected);

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_clean_close_does_not_reconnect() {
    let server = MockWsServer::start().await;
    let (client, _rx) = build_client(server.ws_url(), fast_backoff(Some(3)), None).await;

    assert!(server.wait_for_connections(1, WAIT).await);
    assert!(wait_for_event(&client, |e| *e == ClientEvent::Connected).await.is_some());

    server.close_with(CloseCode::Normal);

    assert!(wait_for_event(&client, |e| *e == ClientEvent::Disconnected).await.is_some());
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connection_count(), 1);
    assert_eq!(client.metrics().reconnect_count, 0);

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abnormal_close_reconnects_and_resubscribes() {
    let server = MockWsServer::start().await;
    let (client, _rx) = build_client(server.ws_url(), fast_backoff(Some(3)), None).await;

    assert!(server.wait_for_received(SUBSCRIBE, 1, WAIT).await);

    server.close_with(CloseCode::Away);

    let event = wait_for_event(&client, |e| matches!(e, ClientEvent::Reconnecting { .. })).await;
    assert_eq!(
        event,
        Some(ClientEvent::Reconnecting {
            attempt: 1,
            delay: Duration::from_millis(50)
        })
    );

    assert!(server.wait_for_connections(2, WAIT).await);
    assert!(server.wait_for_received(SUBSCRIBE, 2, WAIT).await);
    assert!(wait_for_event(&client, |e| *e == ClientEvent::Connected).await.is_some());
    assert_eq!(client.metrics().reconnect_count, 1);

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_stream_counts_as_abnormal() {
    let server = MockWsServer::start().await;
    let (client, _rx) = build_client(server.ws_url(), fast_backoff(Some(3)), None).await;

    assert!(server.wait_for_connections(1, WAIT).await);
    server.drop_connections();

    assert!(wait_for_event(&client, |e| matches!(e, ClientEvent::Reconnecting { attempt: 1, .. }))
        .await
        .is_some());
    assert!(server.wait_for_connections(2, WAIT).await);

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_timeout_fails_when_ceiling_is_zero() {
    let url = silent_listener().await;
    let (client, _rx) = build_client(url, fast_backoff(Some(0)), None).await;

    let event = wait_for_event(&client, |e| matches!(e, ClientEvent::Failed { .. })).await;
    assert_eq!(event, Some(ClientEvent::Failed { attempts: 0 }));
    assert_eq!(client.connection_state(), ConnectionState::Failed);

    // Manual retry starts a fresh attempt
    client.retry().unwrap();
    assert!(wait_for_event(&client, |e| *e == ClientEvent::Connecting).await.is_some());
    assert!(wait_for_event(&client, |e| matches!(e, ClientEvent::Failed { .. }))
        .await
        .is_some());

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retry_ceiling_then_manual_retry_resets_counter() {
    let url = refused_url().await;
    let (client, _rx) = build_client(url, fast_backoff(Some(2)), None).await;

    let mut reconnects = Vec::new();
    let failed = wait_for_event(&client, |e| {
        if let ClientEvent::Reconnecting { attempt, .. } = e {
            reconnects.push(*attempt);
        }
        matches!(e, ClientEvent::Failed { .. })
    })
    .await;

    assert_eq!(reconnects, vec![1, 2]);
    assert_eq!(failed, Some(ClientEvent::Failed { attempts: 2 }));

    client.retry().unwrap();
    let event = wait_for_event(&client, |e| matches!(e, ClientEvent::Reconnecting { .. })).await;
    assert!(matches!(event, Some(ClientEvent::Reconnecting { attempt: 1, .. })));

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resubscribe_sends_on_open_socket_and_on_reconnect() {
    let server = MockWsServer::start().await;
    let (client, _rx) = build_client(server.ws_url(), fast_backoff(Some(3)), None).await;

    assert!(server.wait_for_received(SUBSCRIBE, 1, WAIT).await);

    let updated = r#"{"assets_ids":["1","2"],"type":"market"}"#;
    client.resubscribe(WsMessage::Text(updated.into())).unwrap();
    assert!(server.wait_for_received(updated, 1, WAIT).await);

    server.close_with(CloseCode::Error);
    assert!(server.wait_for_received(updated, 2, WAIT).await);
    assert_eq!(
        server.received().iter().filter(|t| t.as_str() == SUBSCRIBE).count(),
        1
    );

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_heartbeat_sent_and_pong_filtered() {
    let server = MockWsServer::start().await;
    let (client, rx) = build_client(
        server.ws_url(),
        fast_backoff(Some(3)),
        Some(Duration::from_millis(100)),
    )
    .await;

    assert!(server.wait_for_received("PING", 2, WAIT).await);

    server.push_text("after-pong");
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), "after-pong");

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_frames_are_counted_and_skipped() {
    let server = MockWsServer::start().await;
    let (client, rx) = build_client(server.ws_url(), fast_backoff(Some(3)), None).await;

    assert!(server.wait_for_connections(1, WAIT).await);
    assert!(wait_for_event(&client, |e| *e == ClientEvent::Connected).await.is_some());

    server.push_text("bad frame");
    server.push_text("good frame");

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), "good frame");
    assert_eq!(client.metrics().parse_errors, 1);
    assert_eq!(client.connection_state(), ConnectionState::Connected);

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_stops_delivery() {
    let server = MockWsServer::start().await;
    let (client, rx) = build_client(server.ws_url(), fast_backoff(Some(3)), None).await;

    assert!(server.wait_for_connections(1, WAIT).await);
    client.shutdown().await.unwrap();

    server.push_text("too late");
    assert!(matches!(
        rx.recv_timeout(Duration::from_millis(500)),
        Err(RecvTimeoutError::Disconnected)
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn test_build_rejects_zero_connect_timeout() {
    let result = hypersockets::builder()
        .url("ws://127.0.0.1:1")
        .pipeline(PassthroughParser, |_msg: WsMessage| -> Result<()> { Ok(()) })
        .connect_timeout(Duration::ZERO)
        .build()
        .await;

    assert!(matches!(result, Err(HyperSocketError::Configuration(_))));
}
