//! Client core: configuration, builder, the supervised connection task and
//! its building blocks.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hypersockets::*;
//!
//! let client = hypersockets::builder()
//!     .url("wss://api.example.com/ws")
//!     .pipeline(PassthroughParser, |msg: WsMessage| {
//!         println!("{:?}", msg);
//!         Ok(())
//!     })
//!     .heartbeat(Duration::from_secs(10), WsMessage::Text("PING".into()))
//!     .subscription(WsMessage::Text(r#"{"type":"market"}"#.into()))
//!     .build()
//!     .await?;
//!
//! client.retry()?;
//! client.shutdown().await?;
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod heartbeat;
pub mod supervisor;

// Re-export main types
pub use builder::{states, WebSocketClientBuilder};
pub use client::{ClientEvent, Metrics, WebSocketClient};
pub use config::ClientConfig;
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use supervisor::{CloseKind, Supervisor, Transition};

// Re-export traits for convenience
pub use crate::traits::*;

/// Create a new WebSocket client builder
pub fn builder() -> WebSocketClientBuilder<builder::states::NoUrl, builder::states::NoPipeline, ()> {
    WebSocketClientBuilder::new()
}
