//! WebSocket message types for the Polymarket market channel
//!
//! Message types for the public market channel:
//! - book: Full orderbook snapshot for one asset
//! - price_change: Incremental level updates
//! - last_trade_price: Trade execution events
//! - tick_size_change: Tick size changes (price reaches limits)
//!
//! Frames are either a single event object or an array of them. Each array
//! element is decoded on its own so one malformed element never costs the
//! rest of the frame.

use crate::error::FeedError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text frame the feed sends in reply to a "PING" heartbeat
pub const PONG: &str = "PONG";

/// Subscription message sent after connecting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketSubscription {
    pub assets_ids: Vec<String>,
    #[serde(rename = "type")]
    pub msg_type: String,
}

impl MarketSubscription {
    pub fn new(token_ids: Vec<String>) -> Self {
        Self {
            assets_ids: token_ids,
            msg_type: "market".to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, FeedError> {
        serde_json::to_string(self).map_err(FeedError::from)
    }
}

/// Price level as sent on the wire (decimal strings)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLevel {
    pub price: String,
    pub size: String,
}

/// Full orderbook snapshot for one asset
#[derive(Debug, Clone, Deserialize)]
pub struct BookSnapshot {
    pub asset_id: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, alias = "buys")]
    pub bids: Vec<WireLevel>,
    #[serde(default, alias = "sells")]
    pub asks: Vec<WireLevel>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
}

/// Price change event carrying one or more level updates
///
/// Newer frames list `price_changes`, each with its own asset id. Older
/// frames carry a top-level `asset_id` and a `changes` list.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceChangeEvent {
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub price_changes: Vec<PriceChange>,
    #[serde(default)]
    pub changes: Vec<LevelChange>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Individual price change within an event
#[derive(Debug, Clone, Deserialize)]
pub struct PriceChange {
    pub asset_id: String,
    pub price: String,
    pub size: String,
    pub side: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub best_bid: Option<String>,
    #[serde(default)]
    pub best_ask: Option<String>,
}

/// Level change in the older single-asset layout
#[derive(Debug, Clone, Deserialize)]
pub struct LevelChange {
    pub price: String,
    pub size: String,
    pub side: String,
}

/// A level change with its asset id resolved, borrowed from the event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeRef<'a> {
    pub asset_id: &'a str,
    pub price: &'a str,
    pub size: &'a str,
    pub side: &'a str,
}

impl PriceChangeEvent {
    /// All changes in arrival order, whichever layout the frame used
    pub fn changes(&self) -> Result<Vec<ChangeRef<'_>>, FeedError> {
        let mut out: Vec<ChangeRef<'_>> = self
            .price_changes
            .iter()
            .map(|c| ChangeRef {
                asset_id: &c.asset_id,
                price: &c.price,
                size: &c.size,
                side: &c.side,
            })
            .collect();

        if !self.changes.is_empty() {
            let asset_id = self
                .asset_id
                .as_deref()
                .ok_or(FeedError::MissingField("asset_id"))?;
            out.extend(self.changes.iter().map(|c| ChangeRef {
                asset_id,
                price: &c.price,
                size: &c.size,
                side: &c.side,
            }));
        }

        Ok(out)
    }
}

/// Last trade price event - emitted when a maker and taker order are matched
#[derive(Debug, Clone, Deserialize)]
pub struct LastTradePriceEvent {
    pub asset_id: String,
    #[serde(default)]
    pub market: Option<String>,
    pub price: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub fee_rate_bps: Option<String>,
}

/// Tick size change event - emitted when book price reaches limits (>0.96 or <0.04)
#[derive(Debug, Clone, Deserialize)]
pub struct TickSizeChangeEvent {
    pub asset_id: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub old_tick_size: Option<String>,
    pub new_tick_size: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One decoded feed event
#[derive(Debug, Clone)]
pub enum FeedMessage {
    Book(BookSnapshot),
    PriceChange(PriceChangeEvent),
    LastTradePrice(LastTradePriceEvent),
    TickSizeChange(TickSizeChangeEvent),
    /// Event type this engine does not consume
    Unknown(String),
}

impl FeedMessage {
    /// Event type tag as sent on the wire
    pub fn event_type(&self) -> &str {
        match self {
            FeedMessage::Book(_) => "book",
            FeedMessage::PriceChange(_) => "price_change",
            FeedMessage::LastTradePrice(_) => "last_trade_price",
            FeedMessage::TickSizeChange(_) => "tick_size_change",
            FeedMessage::Unknown(kind) => kind,
        }
    }
}

/// Result of decoding one text frame
#[derive(Debug)]
pub struct DecodedFrame {
    pub messages: Vec<FeedMessage>,
    /// Elements that failed to decode, with the reason
    pub rejected: Vec<FeedError>,
}

/// Decode a text frame holding one event object or an array of them
///
/// Fails only when the frame as a whole is not JSON (or not an object or
/// array). Individual malformed elements are collected in `rejected`.
pub fn decode_frame(text: &str) -> Result<DecodedFrame, FeedError> {
    let value: Value = serde_json::from_str(text)?;

    let elements = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(FeedError::UnexpectedShape(format!(
                "expected object or array, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut frame = DecodedFrame {
        messages: Vec::with_capacity(elements.len()),
        rejected: Vec::new(),
    };

    for element in elements {
        match decode_event(element) {
            Ok(message) => frame.messages.push(message),
            Err(e) => frame.rejected.push(e),
        }
    }

    Ok(frame)
}

/// Decode a single event object by its `event_type` tag
pub fn decode_event(value: Value) -> Result<FeedMessage, FeedError> {
    let event_type = value
        .get("event_type")
        .and_then(Value::as_str)
        .ok_or(FeedError::MissingField("event_type"))?
        .to_string();

    match event_type.as_str() {
        "book" => typed(value).map(FeedMessage::Book),
        "price_change" => typed(value).map(FeedMessage::PriceChange),
        "last_trade_price" => typed(value).map(FeedMessage::LastTradePrice),
        "tick_size_change" => typed(value).map(FeedMessage::TickSizeChange),
        _ => Ok(FeedMessage::Unknown(event_type)),
    }
}

fn typed<T: DeserializeOwned>(value: Value) -> Result<T, FeedError> {
    serde_json::from_value(value).map_err(FeedError::from)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
