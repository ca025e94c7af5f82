//! Polymarket order-book synchronization
//!
//! Keeps live per-instrument books from the CLOB market channel and exposes
//! them, plus derived prices, to any number of consumers.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod utils;

pub use infrastructure::config;

// Re-export commonly used items
pub use application::{BookSyncEngine, FeedMessageReconciler, Reconciled, SubscriptionPort};
pub use domain::{
    pricing, Instrument, InstrumentBook, InstrumentKey, InstrumentRegistry, LastTrade, Outcome,
    PriceLevel, PriceLevelTable, Side, SortDirection, TradeSource,
};
pub use error::{EngineError, FeedError};
pub use infrastructure::{
    BookChange, BookStore, ChangeKind, ChangeListener, ConfigError, FeedConfig, ListenerId,
    MarketConfig, RestClient, RestError,
};
pub use utils::{init_tracing, ShutdownManager};
