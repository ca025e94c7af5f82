//! Infrastructure: shared store, feed clients, configuration, logging

pub mod book_store;
pub mod client;
pub mod config;
pub mod logging;

pub use book_store::{BookChange, BookStore, ChangeKind, ChangeListener, ListenerId};
pub use client::{RestClient, RestError};
pub use config::{ConfigError, FeedConfig, MarketConfig};
pub use logging::init_tracing;
