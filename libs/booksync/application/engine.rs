//! Book sync engine
//!
//! Composition of one supervised market-channel connection and one shared
//! book store. Constructed explicitly by the application and given a
//! `start`/`stop` lifecycle; every consumer reads through [`SubscriptionPort`].

use super::reconciler::{FeedMessageReconciler, SharedRegistry};
use crate::domain::{pricing, Instrument, InstrumentBook, InstrumentKey, InstrumentRegistry};
use crate::error::EngineError;
use crate::infrastructure::book_store::{BookChange, BookStore, ListenerId};
use crate::infrastructure::client::clob::market_ws::{
    build_feed_client, log_client_event, subscription_frame, FeedFrame,
};
use crate::infrastructure::client::clob::rest::{RestClient, RestError, TokenLastTrade};
use crate::infrastructure::config::FeedConfig;
use chrono::Utc;
use hypersockets::{ClientEvent, ConnectionState, Metrics, WebSocketClient};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Consumer-facing surface of the engine
///
/// Declaring interest drives the subscription; everything else reads the
/// shared store and never blocks on the network.
pub trait SubscriptionPort: Send + Sync {
    /// Replace the full set of tracked instruments
    fn declare_interest(&self, instruments: Vec<Instrument>) -> Result<(), EngineError>;

    /// Copy of the current book for an instrument
    fn get_book(&self, key: &InstrumentKey) -> Option<InstrumentBook>;

    /// Register a callback invoked after every store mutation
    fn on_change(&self, listener: Box<dyn Fn(&BookChange) + Send + Sync>) -> ListenerId;

    fn remove_listener(&self, id: ListenerId) -> bool;

    /// `(best bid + best ask) / 2`, with boundary defaults for an empty side
    fn mid_price(&self, key: &InstrumentKey) -> Option<Decimal>;

    /// Own mid-price, or `1 - mid` of the paired outcome
    fn implied_mid_price(&self, key: &InstrumentKey) -> Option<Decimal>;

    fn connection_state(&self) -> ConnectionState;

    fn complementary_price(&self, price: Decimal) -> Decimal {
        pricing::complementary_price(price)
    }
}

/// Shared order-book sync engine
pub struct BookSyncEngine {
    config: FeedConfig,
    store: BookStore,
    registry: SharedRegistry,
    client: Mutex<Option<WebSocketClient<FeedFrame>>>,
    started: AtomicBool,
}

impl BookSyncEngine {
    /// Create a stopped engine tracking the configured markets
    pub fn new(config: FeedConfig) -> Self {
        let registry = InstrumentRegistry::from_instruments(config.instruments());
        Self {
            config,
            store: BookStore::new(),
            registry: Arc::new(RwLock::new(registry)),
            client: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Handle to the shared store
    pub fn store(&self) -> &BookStore {
        &self.store
    }

    /// Snapshot of the current interest set
    pub fn registry(&self) -> InstrumentRegistry {
        self.registry.read().clone()
    }

    /// Reconciler bound to this engine's registry and store
    ///
    /// Lets synthetic messages be applied without a socket.
    pub fn reconciler(&self) -> FeedMessageReconciler {
        FeedMessageReconciler::new(Arc::clone(&self.registry), self.store.clone())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Open the supervised connection
    pub async fn start(&self) -> Result<(), EngineError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(EngineError::AlreadyStarted);
        }

        let asset_ids = self.registry.read().asset_ids();
        info!("Starting book sync for {} instruments", asset_ids.len());

        let built = match subscription_frame(asset_ids) {
            Ok(subscription) => build_feed_client(&self.config, self.reconciler(), subscription)
                .await
                .map_err(EngineError::from),
            Err(e) => Err(EngineError::from(e)),
        };

        match built {
            Ok(client) => {
                *self.client.lock() = Some(client);
                Ok(())
            }
            Err(e) => {
                self.started.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Close the connection and cancel every timer
    ///
    /// Books stay readable after stop.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let client = self.client.lock().take().ok_or(EngineError::NotStarted)?;
        client.shutdown().await?;
        self.started.store(false, Ordering::Release);
        info!("Book sync stopped");
        Ok(())
    }

    /// Manual retry after the supervisor gave up
    pub fn retry(&self) -> Result<(), EngineError> {
        let guard = self.client.lock();
        let client = guard.as_ref().ok_or(EngineError::NotStarted)?;
        info!("Manual retry requested");
        client.retry()?;
        Ok(())
    }

    pub fn metrics(&self) -> Option<Metrics> {
        self.client.lock().as_ref().map(|c| c.metrics())
    }

    /// Drain pending connection events, logging each
    pub fn drain_events(&self) -> Vec<ClientEvent> {
        let guard = self.client.lock();
        let Some(client) = guard.as_ref() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        while let Some(event) = client.try_recv_event() {
            log_client_event(&event);
            events.push(event);
        }
        events
    }

    /// Pre-populate last trades over REST for every tracked instrument
    ///
    /// Values already received from the stream are kept. Returns the number
    /// of books seeded.
    pub async fn seed_last_trades(&self, rest: &RestClient) -> Result<usize, RestError> {
        let asset_ids = self.registry.read().asset_ids();
        if asset_ids.is_empty() {
            return Ok(0);
        }

        let trades = rest.get_last_trade_prices(&asset_ids).await?;
        let seeded = self.merge_last_trades(trades);

        info!("Seeded last trade for {}/{} instruments", seeded, asset_ids.len());
        Ok(seeded)
    }

    /// Merge REST last trades into the store by token id
    ///
    /// Tokens outside the interest set are skipped. Returns the number of
    /// books seeded.
    pub fn merge_last_trades(&self, trades: impl IntoIterator<Item = TokenLastTrade>) -> usize {
        let now = Utc::now();
        let mut seeded = 0;

        for trade in trades {
            let key = self.registry.read().resolve(&trade.token_id).cloned();
            let Some(key) = key else {
                debug!("REST returned unrequested token {}", trade.token_id);
                continue;
            };
            if self.store.seed_last_trade(&key, trade.price, trade.side, now) {
                seeded += 1;
            }
        }
        seeded
    }

    fn resubscribe(&self, asset_ids: Vec<String>) -> Result<(), EngineError> {
        let guard = self.client.lock();
        let Some(client) = guard.as_ref() else {
            return Ok(());
        };

        client.resubscribe(subscription_frame(asset_ids)?)?;
        Ok(())
    }
}

impl SubscriptionPort for BookSyncEngine {
    fn declare_interest(&self, instruments: Vec<Instrument>) -> Result<(), EngineError> {
        let registry = InstrumentRegistry::from_instruments(instruments);
        let asset_ids = registry.asset_ids();

        {
            let mut current = self.registry.write();
            if current.asset_ids() == asset_ids {
                *current = registry;
                debug!("Interest set unchanged, skipping resubscribe");
                return Ok(());
            }
            *current = registry;
        }

        if asset_ids.is_empty() {
            warn!("Interest set is empty, feed will carry no books");
        }
        info!("Interest set now {} instruments", asset_ids.len());
        self.resubscribe(asset_ids)
    }

    fn get_book(&self, key: &InstrumentKey) -> Option<InstrumentBook> {
        self.store.get(key)
    }

    fn on_change(&self, listener: Box<dyn Fn(&BookChange) + Send + Sync>) -> ListenerId {
        self.store.on_change(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.store.remove_listener(id)
    }

    fn mid_price(&self, key: &InstrumentKey) -> Option<Decimal> {
        self.store.with_book(key, pricing::mid_price).flatten()
    }

    fn implied_mid_price(&self, key: &InstrumentKey) -> Option<Decimal> {
        self.store.with_pair(key, pricing::implied_mid_price)
    }

    fn connection_state(&self) -> ConnectionState {
        self.client
            .lock()
            .as_ref()
            .map(|c| c.connection_state())
            .unwrap_or(ConnectionState::Disconnected)
    }
}
