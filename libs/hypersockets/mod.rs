//! # HyperSockets
//!
//! A supervised WebSocket client for streaming market feeds.
//!
//! ## Features
//!
//! - **Explicit lifecycle**: `Disconnected → Connecting → Connected → Retrying → Failed`,
//!   driven by a pure state machine ([`Supervisor`])
//! - **Type-state builder**: Compile-time guarantees for required configuration
//! - **Ordered delivery**: frames are parsed in arrival order and handled on one thread
//! - **Bounded reconnection**: exponential backoff with a retry ceiling and manual retry
//! - **Connect timeout and heartbeat**: half-open attempts are abandoned, idle links kept warm

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use self::core::{
    builder, client, config, connection_state, heartbeat, supervisor,
    builder::{states, WebSocketClientBuilder},
    client::{ClientEvent, Metrics, WebSocketClient},
    config::ClientConfig,
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    supervisor::{CloseKind, Supervisor, Transition},
};

// Convenience function
pub use self::core::builder as client_builder;
