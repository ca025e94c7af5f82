//! Domain layer: books, instruments and derived pricing
//!
//! Pure data structures with no awareness of the connection.

pub mod instrument;
pub mod orderbook;
pub mod pricing;

pub use instrument::{Instrument, InstrumentKey, InstrumentRegistry, Outcome};
pub use orderbook::{
    InstrumentBook, LastTrade, PriceLevel, PriceLevelTable, Side, SortDirection, TradeSource,
};
pub use pricing::{
    complementary_price, complementary_trade, implied_mid_price, mid_from_quotes, mid_price,
};
