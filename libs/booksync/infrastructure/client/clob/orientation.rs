//! Wire orientation adapter
//!
//! The market channel sends both sides of a `book` snapshot best-last: bids
//! ascend towards the best (highest) bid and asks descend towards the best
//! (lowest) ask. Tables store best-first, so bids arrive in the opposite of
//! display order and asks do too. This is the one place that turns wire
//! levels into canonical table order; nothing downstream trusts wire order.

use super::ws_types::WireLevel;
use crate::domain::{PriceLevel, SortDirection};
use crate::error::FeedError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a decimal string from the wire
pub fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, FeedError> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| FeedError::InvalidDecimal {
            field,
            value: raw.to_string(),
        })
}

/// Parse a non-negative decimal (prices and sizes)
pub fn parse_non_negative(field: &'static str, raw: &str) -> Result<Decimal, FeedError> {
    let value = parse_decimal(field, raw)?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(FeedError::NegativeValue {
            field,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

/// Parse a price; outcome prices live in [0, 1]
pub fn parse_price(field: &'static str, raw: &str) -> Result<Decimal, FeedError> {
    let value = parse_non_negative(field, raw)?;
    if value > Decimal::ONE {
        return Err(FeedError::PriceOutOfRange {
            field,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

/// Parse one wire level
pub fn parse_level(level: &WireLevel) -> Result<PriceLevel, FeedError> {
    Ok(PriceLevel::new(
        parse_price("price", &level.price)?,
        parse_non_negative("size", &level.size)?,
    ))
}

/// Convert one side of a snapshot into canonical order for `direction`
///
/// Every level must parse or the whole side is rejected, so a snapshot is
/// never half-applied. Zero-size levels are dropped. The sort is stable, so
/// a repeated price keeps wire order and the later entry wins once the
/// table deduplicates.
pub fn normalize_side(wire: &[WireLevel], direction: SortDirection) -> Result<Vec<PriceLevel>, FeedError> {
    let mut levels = wire
        .iter()
        .map(parse_level)
        .collect::<Result<Vec<_>, _>>()?;

    levels.retain(|level| !level.size.is_zero());
    levels.sort_by(|a, b| direction.compare(a.price, b.price));
    Ok(levels)
}

/// Canonical (bids, asks) for a snapshot
pub fn normalize_snapshot(
    bids: &[WireLevel],
    asks: &[WireLevel],
) -> Result<(Vec<PriceLevel>, Vec<PriceLevel>), FeedError> {
    Ok((
        normalize_side(bids, SortDirection::Descending)?,
        normalize_side(asks, SortDirection::Ascending)?,
    ))
}

/// Feed timestamps are epoch milliseconds as strings
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}
