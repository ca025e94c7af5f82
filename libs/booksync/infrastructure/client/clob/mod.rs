//! Polymarket CLOB clients: market channel WebSocket and REST

pub mod helpers;
pub mod market_ws;
pub mod orientation;
pub mod rest;
pub mod ws_types;

pub use market_ws::{
    build_feed_client, log_client_event, subscription_frame, FeedFrame, MarketFeedHandler,
    MarketFeedParser,
};
pub use rest::{RestClient, RestError, TokenLastTrade};
pub use ws_types::{decode_frame, FeedMessage, MarketSubscription};
