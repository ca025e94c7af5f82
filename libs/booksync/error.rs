//! Error types for feed decoding and the engine lifecycle

use thiserror::Error;

/// A feed message that could not be decoded or applied
///
/// These are logged and dropped; they never close the connection.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unexpected frame shape: {0}")]
    UnexpectedShape(String),

    #[error("Invalid decimal in {field}: {value:?}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("Negative {field}: {value}")]
    NegativeValue { field: &'static str, value: String },

    #[error("{field} outside [0, 1]: {value}")]
    PriceOutOfRange { field: &'static str, value: String },

    #[error("Unknown side: {0:?}")]
    UnknownSide(String),
}

/// Engine lifecycle errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Engine not started")]
    NotStarted,

    #[error("WebSocket client error: {0}")]
    Client(#[from] hypersockets::HyperSocketError),

    #[error("Failed to encode subscription: {0}")]
    Subscription(#[from] FeedError),
}
