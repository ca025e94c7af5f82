//! Orderbook domain entities
//!
//! Exact-decimal price levels kept in display order at all times, so readers
//! never have to re-sort.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// =============================================================================
// Price Level - Basic unit of orderbook
// =============================================================================

/// Resting liquidity at one price point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Sort direction of a price level table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Highest price first (bids)
    Descending,
    /// Lowest price first (asks)
    Ascending,
}

impl SortDirection {
    /// Ordering of `a` relative to `b` in this direction
    #[inline]
    pub fn compare(self, a: Decimal, b: Decimal) -> Ordering {
        match self {
            SortDirection::Ascending => a.cmp(&b),
            SortDirection::Descending => b.cmp(&a),
        }
    }
}

// =============================================================================
// PriceLevelTable - One side of the orderbook (bids or asks)
// =============================================================================

/// A single side of the orderbook, unique by price and always sorted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevelTable {
    levels: Vec<PriceLevel>,
    direction: SortDirection,
}

impl PriceLevelTable {
    /// Create a new empty table
    pub fn new(direction: SortDirection) -> Self {
        Self {
            levels: Vec::with_capacity(64),
            direction,
        }
    }

    /// Bid table: best (highest) price first
    pub fn bids() -> Self {
        Self::new(SortDirection::Descending)
    }

    /// Ask table: best (lowest) price first
    pub fn asks() -> Self {
        Self::new(SortDirection::Ascending)
    }

    #[inline]
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    fn locate(&self, price: Decimal) -> Result<usize, usize> {
        let direction = self.direction;
        self.levels
            .binary_search_by(|level| direction.compare(level.price, price))
    }

    /// Insert, update or delete the level at `price`
    ///
    /// A non-positive size deletes the level (no-op if absent). Returns true
    /// if the table changed.
    pub fn upsert(&mut self, price: Decimal, size: Decimal) -> bool {
        let found = self.locate(price);

        if size <= Decimal::ZERO {
            return match found {
                Ok(idx) => {
                    self.levels.remove(idx);
                    true
                }
                Err(_) => false,
            };
        }

        match found {
            Ok(idx) => {
                let level = &mut self.levels[idx];
                let changed = level.size != size;
                level.size = size;
                changed
            }
            Err(idx) => {
                self.levels.insert(idx, PriceLevel::new(price, size));
                true
            }
        }
    }

    /// Discard all levels and install `levels`
    ///
    /// The input is sorted into this table's direction, empty levels are
    /// dropped, and when a price repeats the later entry wins.
    pub fn replace_all(&mut self, levels: impl IntoIterator<Item = PriceLevel>) {
        let mut incoming: Vec<PriceLevel> = levels
            .into_iter()
            .filter(|level| level.size > Decimal::ZERO)
            .collect();

        let direction = self.direction;
        // Stable: equal prices keep their arrival order
        incoming.sort_by(|a, b| direction.compare(a.price, b.price));

        self.levels.clear();
        self.levels.reserve(incoming.len());
        for level in incoming {
            match self.levels.last_mut() {
                Some(last) if last.price == level.price => *last = level,
                _ => self.levels.push(level),
            }
        }
    }

    /// Remove every level
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Get best price level (first element)
    #[inline]
    pub fn best(&self) -> Option<PriceLevel> {
        self.levels.first().copied()
    }

    /// Size resting at exactly `price`
    pub fn size_at(&self, price: Decimal) -> Option<Decimal> {
        self.locate(price).ok().map(|idx| self.levels[idx].size)
    }

    /// Get all levels as slice
    #[inline]
    pub fn levels(&self) -> &[PriceLevel] {
        &self.levels
    }

    /// Get number of price levels
    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Get total liquidity (sum of all sizes); None on overflow
    pub fn total_liquidity(&self) -> Option<Decimal> {
        self.levels
            .iter()
            .try_fold(Decimal::ZERO, |acc, level| acc.checked_add(level.size))
    }
}

// =============================================================================
// Side and last trade
// =============================================================================

/// Order side as reported by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse "BUY"/"SELL" in any case
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("buy") {
            Some(Side::Buy)
        } else if raw.eq_ignore_ascii_case("sell") {
            Some(Side::Sell)
        } else {
            None
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a last-trade value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSource {
    /// Startup REST seed
    Rest,
    /// Streaming feed
    Stream,
}

/// Most recent trade on an instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastTrade {
    pub price: Decimal,
    pub side: Option<Side>,
    pub timestamp: DateTime<Utc>,
    pub source: TradeSource,
}

// =============================================================================
// InstrumentBook - Complete orderbook for one instrument
// =============================================================================

/// Complete orderbook for one instrument (one outcome of a market)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentBook {
    pub bids: PriceLevelTable,
    pub asks: PriceLevelTable,
    pub last_trade: Option<LastTrade>,
    pub tick_size: Option<Decimal>,
    /// Whether a full snapshot has been applied since the book was created
    pub snapshot_received: bool,
    /// Time of the last mutation
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for InstrumentBook {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentBook {
    /// Create a new empty orderbook
    pub fn new() -> Self {
        Self {
            bids: PriceLevelTable::bids(),
            asks: PriceLevelTable::asks(),
            last_trade: None,
            tick_size: None,
            snapshot_received: false,
            last_update: None,
        }
    }

    /// Replace both sides; last-trade metadata is preserved
    pub fn apply_snapshot(
        &mut self,
        bids: impl IntoIterator<Item = PriceLevel>,
        asks: impl IntoIterator<Item = PriceLevel>,
    ) {
        self.bids.replace_all(bids);
        self.asks.replace_all(asks);
        self.snapshot_received = true;
        self.touch();
    }

    /// Apply one level change to the table `side` targets
    ///
    /// BUY changes target bids and SELL changes target asks.
    pub fn apply_change(&mut self, side: Side, price: Decimal, size: Decimal) -> bool {
        let changed = match side {
            Side::Buy => self.bids.upsert(price, size),
            Side::Sell => self.asks.upsert(price, size),
        };
        self.touch();
        changed
    }

    /// Overwrite the last trade unconditionally
    pub fn record_trade(&mut self, trade: LastTrade) {
        self.last_trade = Some(trade);
        self.touch();
    }

    pub fn set_tick_size(&mut self, tick_size: Decimal) {
        self.tick_size = Some(tick_size);
        self.touch();
    }

    fn touch(&mut self) {
        self.last_update = Some(Utc::now());
    }

    /// Get best bid (highest buy price)
    #[inline]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.best()
    }

    /// Get best ask (lowest sell price)
    #[inline]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.best()
    }

    #[inline]
    pub fn last_trade_price(&self) -> Option<Decimal> {
        self.last_trade.as_ref().map(|t| t.price)
    }

    #[inline]
    pub fn last_trade_side(&self) -> Option<Side> {
        self.last_trade.as_ref().and_then(|t| t.side)
    }

    #[inline]
    pub fn last_trade_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_trade.as_ref().map(|t| t.timestamp)
    }

    /// Calculate spread (best_ask - best_bid)
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Format orderbook for logging
    pub fn format_summary(&self) -> String {
        let bid_str = self
            .best_bid()
            .map(|l| format!("{} ({})", l.price, l.size))
            .unwrap_or_else(|| "N/A".to_string());

        let ask_str = self
            .best_ask()
            .map(|l| format!("{} ({})", l.price, l.size))
            .unwrap_or_else(|| "N/A".to_string());

        let spread_str = self
            .spread()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        let last_str = self
            .last_trade
            .as_ref()
            .map(|t| match t.side {
                Some(side) => format!("{} {}", side, t.price),
                None => t.price.to_string(),
            })
            .unwrap_or_else(|| "N/A".to_string());

        format!(
            "Bid: {} | Ask: {} | Spread: {} | Last: {}",
            bid_str, ask_str, spread_str, last_str
        )
    }

    /// Format full orderbook depth for logging (top N levels)
    pub fn format_depth(&self, max_levels: usize) -> String {
        fn side(table: &PriceLevelTable, max_levels: usize) -> String {
            let levels: Vec<String> = table
                .levels()
                .iter()
                .take(max_levels)
                .map(|l| format!("{}({})", l.price, l.size))
                .collect();
            if levels.is_empty() {
                "(empty)".to_string()
            } else {
                levels.join(", ")
            }
        }

        format!(
            "  Bids: {}\n  Asks: {}",
            side(&self.bids, max_levels),
            side(&self.asks, max_levels)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
