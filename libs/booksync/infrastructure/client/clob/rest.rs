//! REST client for the Polymarket CLOB
//!
//! Only the last-trade lookup used to seed books before the stream is live.

use super::helpers::{parse_json, require_success};
use super::orientation::parse_price;
use crate::domain::Side;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),
}

pub type Result<T> = std::result::Result<T, RestError>;

#[derive(Debug, Serialize)]
struct TokenParam<'a> {
    token_id: &'a str,
}

/// Raw last-trade entry as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct LastTradePriceEntry {
    pub token_id: String,
    pub price: String,
    #[serde(default)]
    pub side: Option<String>,
}

/// Parsed last trade for one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLastTrade {
    pub token_id: String,
    pub price: Decimal,
    pub side: Option<Side>,
}

/// REST API client for Polymarket CLOB
pub struct RestClient {
    base_url: String,
    client: Client,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Most recent trade price and side per token
    ///
    /// Entries that fail to parse are skipped with a warning.
    pub async fn get_last_trade_prices(&self, token_ids: &[String]) -> Result<Vec<TokenLastTrade>> {
        if token_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/last-trades-prices", self.base_url);
        let body: Vec<TokenParam<'_>> = token_ids
            .iter()
            .map(|token_id| TokenParam { token_id })
            .collect();

        debug!("Fetching last trade prices for {} tokens from {}", token_ids.len(), url);

        let response = self.client.post(&url).json(&body).send().await?;
        let response = require_success(response, "Failed to fetch last trade prices").await?;
        let entries: Vec<LastTradePriceEntry> = parse_json(response).await?;

        Ok(entries.into_iter().filter_map(parse_entry).collect())
    }
}

fn parse_entry(entry: LastTradePriceEntry) -> Option<TokenLastTrade> {
    let price = match parse_price("price", &entry.price) {
        Ok(price) => price,
        Err(e) => {
            warn!("Skipping last trade for {}: {}", entry.token_id, e);
            return None;
        }
    };
    let side = entry.side.as_deref().and_then(Side::parse);

    Some(TokenLastTrade {
        token_id: entry.token_id,
        price,
        side,
    })
}
