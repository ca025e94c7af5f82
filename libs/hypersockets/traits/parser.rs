use crate::error::Result;

/// Application-level WebSocket frame (text or binary payload)
///
/// Control frames (ping/pong/close) are handled by the client and never
/// reach parsers or handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Get the message as binary, if it is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            WsMessage::Text(_) => None,
            WsMessage::Binary(b) => Some(b),
        }
    }

    /// Check if message is text
    pub fn is_text(&self) -> bool {
        matches!(self, WsMessage::Text(_))
    }
}

impl From<String> for WsMessage {
    fn from(text: String) -> Self {
        WsMessage::Text(text)
    }
}

impl From<&str> for WsMessage {
    fn from(text: &str) -> Self {
        WsMessage::Text(text.to_string())
    }
}

/// Turns raw frames into typed messages
///
/// Parsing runs on the connection's I/O task, one frame at a time and in
/// arrival order, so it must never block. Implementations return:
/// * `Ok(Some(message))` - dispatch `message` to the handler
/// * `Ok(None)` - frame carries nothing for the handler (keepalive replies, filler)
/// * `Err(_)` - malformed frame; it is logged and dropped, the connection stays up
pub trait MessageParser: Send + Sync + 'static {
    /// The parsed message type
    type Message: Send + std::fmt::Debug + 'static;

    /// Parse one received frame
    fn parse(&self, message: &WsMessage) -> Result<Option<Self::Message>>;
}

/// Parser that forwards every frame untouched
pub struct PassthroughParser;

impl MessageParser for PassthroughParser {
    type Message = WsMessage;

    fn parse(&self, message: &WsMessage) -> Result<Option<Self::Message>> {
        Ok(Some(message.clone()))
    }
}
