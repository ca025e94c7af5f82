//! Instrument identity
//!
//! The feed addresses instruments by opaque asset ids. The engine keys books
//! by `(market, outcome)` so the two complementary outcomes of a market can
//! be paired.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Outcome discriminator of a two-outcome market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// The paired outcome
    pub fn complement(self) -> Self {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Yes => f.write_str("YES"),
            Outcome::No => f.write_str("NO"),
        }
    }
}

/// Book key: underlying market plus outcome
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentKey {
    pub market: String,
    pub outcome: Outcome,
}

impl InstrumentKey {
    pub fn new(market: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            market: market.into(),
            outcome,
        }
    }

    pub fn yes(market: impl Into<String>) -> Self {
        Self::new(market, Outcome::Yes)
    }

    pub fn no(market: impl Into<String>) -> Self {
        Self::new(market, Outcome::No)
    }

    /// Key of the paired outcome in the same market
    pub fn complement(&self) -> Self {
        Self::new(self.market.clone(), self.outcome.complement())
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.market, self.outcome)
    }
}

/// A streamable instrument: feed asset id and the key its book is stored under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub asset_id: String,
    pub key: InstrumentKey,
}

impl Instrument {
    pub fn new(asset_id: impl Into<String>, key: InstrumentKey) -> Self {
        Self {
            asset_id: asset_id.into(),
            key,
        }
    }

    /// Both outcome instruments of a two-outcome market
    pub fn binary_market(
        market: impl Into<String>,
        yes_token: impl Into<String>,
        no_token: impl Into<String>,
    ) -> [Instrument; 2] {
        let market = market.into();
        [
            Instrument::new(yes_token, InstrumentKey::yes(market.clone())),
            Instrument::new(no_token, InstrumentKey::no(market)),
        ]
    }
}

/// Lookup from feed asset id to instrument key
///
/// Built from the declared instruments of interest. When an asset id is
/// declared twice the later declaration wins.
#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    by_asset: HashMap<String, InstrumentKey>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_instruments(instruments: impl IntoIterator<Item = Instrument>) -> Self {
        let by_asset = instruments
            .into_iter()
            .map(|i| (i.asset_id, i.key))
            .collect();
        Self { by_asset }
    }

    /// Resolve a feed asset id; None for instruments outside the interest set
    #[inline]
    pub fn resolve(&self, asset_id: &str) -> Option<&InstrumentKey> {
        self.by_asset.get(asset_id)
    }

    /// Subscribed asset ids in a stable (sorted) order
    pub fn asset_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.by_asset.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.by_asset.contains_key(asset_id)
    }

    pub fn len(&self) -> usize {
        self.by_asset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_asset.is_empty()
    }
}
