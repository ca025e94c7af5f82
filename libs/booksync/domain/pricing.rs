//! Derived pricing
//!
//! Stateless helpers over book contents. Prices live in [0, 1]; a missing
//! side falls back to the boundary of that range.

use super::orderbook::{InstrumentBook, Side};
use rust_decimal::Decimal;

/// Stand-in best bid when the bid side is empty
pub const EMPTY_BID_DEFAULT: Decimal = Decimal::ZERO;

/// Stand-in best ask when the ask side is empty
pub const EMPTY_ASK_DEFAULT: Decimal = Decimal::ONE;

/// Midpoint of best bid and best ask
///
/// With exactly one side empty the missing quote is replaced by its boundary
/// default (0 for bids, 1 for asks). None when both sides are empty.
pub fn mid_price(book: &InstrumentBook) -> Option<Decimal> {
    mid_from_quotes(
        book.best_bid().map(|l| l.price),
        book.best_ask().map(|l| l.price),
    )
}

pub fn mid_from_quotes(best_bid: Option<Decimal>, best_ask: Option<Decimal>) -> Option<Decimal> {
    let (bid, ask) = match (best_bid, best_ask) {
        (None, None) => return None,
        (bid, ask) => (
            bid.unwrap_or(EMPTY_BID_DEFAULT),
            ask.unwrap_or(EMPTY_ASK_DEFAULT),
        ),
    };
    bid.checked_add(ask).map(|sum| sum / Decimal::TWO)
}

/// Price of the paired outcome: `1 - p`
#[inline]
pub fn complementary_price(price: Decimal) -> Decimal {
    Decimal::ONE - price
}

/// A trade on one outcome expressed on the paired outcome
///
/// Buying YES at `p` is equivalent to selling NO at `1 - p`.
pub fn complementary_trade(price: Decimal, side: Side) -> (Decimal, Side) {
    (complementary_price(price), side.opposite())
}

/// Mid-price of an instrument, or the complement of its pair's mid-price
/// when only the paired book is available
pub fn implied_mid_price(
    own: Option<&InstrumentBook>,
    paired: Option<&InstrumentBook>,
) -> Option<Decimal> {
    own.and_then(mid_price)
        .or_else(|| paired.and_then(mid_price).map(complementary_price))
}
