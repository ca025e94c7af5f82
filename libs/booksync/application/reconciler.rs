//! Feed message reconciler
//!
//! Applies decoded feed events to the book store. Synchronous and
//! non-blocking; driven from the single handler thread in arrival order, or
//! directly by tests with synthetic messages.

use crate::domain::{InstrumentKey, InstrumentRegistry, LastTrade, Side, TradeSource};
use crate::error::FeedError;
use crate::infrastructure::book_store::{BookStore, ChangeKind};
use crate::infrastructure::client::clob::orientation::{
    normalize_snapshot, parse_decimal, parse_non_negative, parse_price, parse_timestamp,
};
use crate::infrastructure::client::clob::ws_types::{
    BookSnapshot, FeedMessage, LastTradePriceEvent, PriceChangeEvent, TickSizeChangeEvent,
};
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Shared, replaceable set of known instruments
pub type SharedRegistry = Arc<RwLock<InstrumentRegistry>>;

/// What applying one message did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Number of instrument books mutated
    Applied(usize),
    /// Every referenced asset id is outside the interest set
    UnknownInstrument,
    /// Event type this engine does not consume
    Ignored,
}

/// Turns decoded feed events into book mutations
#[derive(Clone)]
pub struct FeedMessageReconciler {
    registry: SharedRegistry,
    store: BookStore,
}

impl FeedMessageReconciler {
    pub fn new(registry: SharedRegistry, store: BookStore) -> Self {
        Self { registry, store }
    }

    pub fn store(&self) -> &BookStore {
        &self.store
    }

    fn resolve(&self, asset_id: &str) -> Option<InstrumentKey> {
        let key = self.registry.read().resolve(asset_id).cloned();
        if key.is_none() {
            trace!("Dropping message for unknown asset {}", asset_id);
        }
        key
    }

    /// Apply one decoded message
    ///
    /// An error means the message was malformed and nothing was applied,
    /// except for price changes, where malformed entries are skipped and
    /// the rest of the batch still applies.
    pub fn apply(&self, message: &FeedMessage) -> Result<Reconciled, FeedError> {
        match message {
            FeedMessage::Book(snapshot) => self.apply_snapshot(snapshot),
            FeedMessage::PriceChange(event) => self.apply_price_change(event),
            FeedMessage::LastTradePrice(event) => self.apply_last_trade(event),
            FeedMessage::TickSizeChange(event) => self.apply_tick_size(event),
            FeedMessage::Unknown(kind) => {
                trace!("Ignoring {} event", kind);
                Ok(Reconciled::Ignored)
            }
        }
    }

    fn apply_snapshot(&self, snapshot: &BookSnapshot) -> Result<Reconciled, FeedError> {
        let Some(key) = self.resolve(&snapshot.asset_id) else {
            return Ok(Reconciled::UnknownInstrument);
        };

        let (bids, asks) = normalize_snapshot(&snapshot.bids, &snapshot.asks)?;
        debug!("Snapshot for {}: {} bids, {} asks", key, bids.len(), asks.len());

        self.store.update(&key, ChangeKind::Snapshot, |book| {
            book.apply_snapshot(bids, asks)
        });
        Ok(Reconciled::Applied(1))
    }

    fn apply_price_change(&self, event: &PriceChangeEvent) -> Result<Reconciled, FeedError> {
        let changes = event.changes()?;

        // Group by instrument, keeping first-seen order across instruments
        // and arrival order within each.
        let mut batches: Vec<(InstrumentKey, Vec<(Side, Decimal, Decimal)>)> = Vec::new();
        let mut referenced_known = false;

        for change in changes {
            let Some(key) = self.resolve(change.asset_id) else {
                continue;
            };
            referenced_known = true;

            let parsed = Side::parse(change.side)
                .ok_or_else(|| FeedError::UnknownSide(change.side.to_string()))
                .and_then(|side| {
                    Ok((
                        side,
                        parse_price("price", change.price)?,
                        parse_non_negative("size", change.size)?,
                    ))
                });

            let level = match parsed {
                Ok(level) => level,
                Err(e) => {
                    warn!("Skipping malformed price change for {}: {}", key, e);
                    continue;
                }
            };

            match batches.iter_mut().find(|(k, _)| *k == key) {
                Some((_, batch)) => batch.push(level),
                None => batches.push((key, vec![level])),
            }
        }

        if !referenced_known {
            return Ok(Reconciled::UnknownInstrument);
        }

        for (key, batch) in &batches {
            debug!("Applying {} level changes to {}", batch.len(), key);
            self.store.update(key, ChangeKind::LevelUpdate, |book| {
                for (side, price, size) in batch {
                    book.apply_change(*side, *price, *size);
                }
            });
        }

        Ok(Reconciled::Applied(batches.len()))
    }

    fn apply_last_trade(&self, event: &LastTradePriceEvent) -> Result<Reconciled, FeedError> {
        let Some(key) = self.resolve(&event.asset_id) else {
            return Ok(Reconciled::UnknownInstrument);
        };

        let price = parse_price("price", &event.price)?;
        let side = match event.side.as_deref() {
            Some(raw) => Some(Side::parse(raw).ok_or_else(|| FeedError::UnknownSide(raw.to_string()))?),
            None => None,
        };
        let timestamp = parse_timestamp(event.timestamp.as_deref()).unwrap_or_else(Utc::now);

        debug!("Trade on {}: {:?} @ {}", key, side, price);
        self.store.update(&key, ChangeKind::LastTrade, |book| {
            book.record_trade(LastTrade {
                price,
                side,
                timestamp,
                source: TradeSource::Stream,
            })
        });
        Ok(Reconciled::Applied(1))
    }

    fn apply_tick_size(&self, event: &TickSizeChangeEvent) -> Result<Reconciled, FeedError> {
        let Some(key) = self.resolve(&event.asset_id) else {
            return Ok(Reconciled::UnknownInstrument);
        };

        let tick_size = parse_decimal("new_tick_size", &event.new_tick_size)?;
        debug!("Tick size for {} now {}", key, tick_size);
        self.store.update(&key, ChangeKind::TickSize, |book| book.set_tick_size(tick_size));
        Ok(Reconciled::Applied(1))
    }
}
