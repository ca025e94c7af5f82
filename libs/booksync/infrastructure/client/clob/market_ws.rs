//! WebSocket pipeline for the Polymarket market channel
//!
//! `MarketFeedParser` decodes frames on the connection task in arrival
//! order; `MarketFeedHandler` applies them on the single handler thread.

use super::ws_types::{decode_frame, FeedMessage, MarketSubscription, PONG};
use crate::application::reconciler::FeedMessageReconciler;
use crate::infrastructure::config::FeedConfig;
use hypersockets::{
    ClientEvent, HyperSocketError, MessageHandler, MessageParser, WebSocketClient,
    WebSocketClientBuilder, WsMessage,
};
use tracing::{debug, error, info, warn};

/// Events decoded from one text frame
#[derive(Debug)]
pub struct FeedFrame(pub Vec<FeedMessage>);

// =============================================================================
// Parser - Decodes WebSocket frames
// =============================================================================

/// Decodes market channel frames, filtering heartbeat replies
#[derive(Debug, Default, Clone, Copy)]
pub struct MarketFeedParser;

impl MessageParser for MarketFeedParser {
    type Message = FeedFrame;

    fn parse(&self, message: &WsMessage) -> hypersockets::Result<Option<FeedFrame>> {
        let text = match message.as_text() {
            Some(t) => t,
            None => {
                debug!("Ignoring binary frame");
                return Ok(None);
            }
        };

        if text == PONG {
            debug!("Pong received");
            return Ok(None);
        }

        let frame = decode_frame(text).map_err(|e| HyperSocketError::Parse(e.to_string()))?;

        for rejected in &frame.rejected {
            warn!("Dropping malformed feed event: {}", rejected);
        }

        if frame.messages.is_empty() {
            return Ok(None);
        }
        Ok(Some(FeedFrame(frame.messages)))
    }
}

// =============================================================================
// Handler - Applies decoded events to the book store
// =============================================================================

/// Applies decoded frames through the reconciler
pub struct MarketFeedHandler {
    reconciler: FeedMessageReconciler,
    message_count: u64,
}

impl MarketFeedHandler {
    pub fn new(reconciler: FeedMessageReconciler) -> Self {
        Self {
            reconciler,
            message_count: 0,
        }
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }
}

impl MessageHandler<FeedFrame> for MarketFeedHandler {
    fn handle(&mut self, frame: FeedFrame) -> hypersockets::Result<()> {
        for message in &frame.0 {
            self.message_count += 1;
            if let Err(e) = self.reconciler.apply(message) {
                warn!("Dropping malformed {} message: {}", message.event_type(), e);
            }
        }
        Ok(())
    }
}

// =============================================================================
// WebSocket Client Builder
// =============================================================================

/// Subscription frame for a set of asset ids
///
/// An empty set still yields a frame (`"assets_ids":[]`), so the socket
/// always carries exactly the current interest set.
pub fn subscription_frame(asset_ids: Vec<String>) -> Result<WsMessage, crate::error::FeedError> {
    let json = MarketSubscription::new(asset_ids).to_json()?;
    Ok(WsMessage::Text(json))
}

/// Build the supervised market channel client
pub async fn build_feed_client(
    config: &FeedConfig,
    reconciler: FeedMessageReconciler,
    subscription: WsMessage,
) -> hypersockets::Result<WebSocketClient<FeedFrame>> {
    WebSocketClientBuilder::new()
        .url(config.ws_url.clone())
        .pipeline(MarketFeedParser, MarketFeedHandler::new(reconciler))
        .heartbeat(
            config.heartbeat_interval(),
            WsMessage::Text(config.heartbeat_payload.clone()),
        )
        .connect_timeout(config.connect_timeout())
        .reconnect_strategy(config.reconnect_strategy())
        .subscription(subscription)
        .build()
        .await
}

// =============================================================================
// Client Event Handling
// =============================================================================

/// Log a client lifecycle event
pub fn log_client_event(event: &ClientEvent) {
    match event {
        ClientEvent::Connecting => debug!("[Feed] Connecting"),
        ClientEvent::Connected => info!("[Feed] WebSocket connected"),
        ClientEvent::Disconnected => warn!("[Feed] WebSocket closed cleanly"),
        ClientEvent::Reconnecting { attempt, delay } => {
            warn!("[Feed] Reconnecting in {:?} (attempt {})", delay, attempt)
        }
        ClientEvent::Failed { attempts } => {
            error!("[Feed] Gave up after {} attempts, manual retry required", attempts)
        }
        ClientEvent::Error(err) => warn!("[Feed] Error: {}", err),
    }
}
