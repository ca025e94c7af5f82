//! # HyperSockets Traits
//!
//! Core traits and types for the HyperSockets WebSocket client library:
//!
//! - **MessageParser**: Turn raw frames into typed messages
//! - **MessageHandler**: Consume typed messages sequentially
//! - **ReconnectionStrategy**: Control reconnection delays and the retry ceiling

pub mod error;
pub mod handler;
pub mod parser;
pub mod reconnect;

// Re-export commonly used types
pub use error::{HyperSocketError, Result};
pub use handler::MessageHandler;
pub use parser::{MessageParser, PassthroughParser, WsMessage};
pub use reconnect::{ExponentialBackoff, ReconnectionStrategy};
