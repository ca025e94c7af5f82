//! Feed configuration (YAML)

use crate::domain::Instrument;
use hypersockets::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Environment override for the WebSocket URL
pub const WS_URL_ENV: &str = "BOOK_SYNC_WS_URL";

/// Environment override for the REST URL
pub const REST_URL_ENV: &str = "BOOK_SYNC_REST_URL";

/// One two-outcome market of interest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Market (condition) identifier used as the book key
    pub market: String,
    pub yes_token: String,
    pub no_token: String,
}

/// Order-book sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_heartbeat_payload")]
    pub heartbeat_payload: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_initial_delay")]
    pub reconnect_initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_reconnect_attempts: usize,
    /// Pre-populate last trades over REST before the stream is live
    #[serde(default = "default_true")]
    pub seed_last_trades: bool,
    /// Cadence of mid-price polling in the watch binary
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
}

fn default_ws_url() -> String {
    "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string()
}

fn default_rest_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_heartbeat_interval() -> u64 {
    10
}

fn default_heartbeat_payload() -> String {
    "PING".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    16000
}

fn default_max_attempts() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            rest_url: default_rest_url(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            heartbeat_payload: default_heartbeat_payload(),
            connect_timeout_secs: default_connect_timeout(),
            reconnect_initial_delay_ms: default_initial_delay(),
            reconnect_max_delay_ms: default_max_delay(),
            max_reconnect_attempts: default_max_attempts(),
            seed_last_trades: default_true(),
            poll_interval_secs: default_poll_interval(),
            log_level: default_log_level(),
            markets: Vec::new(),
        }
    }
}

impl FeedConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml(&yaml_content)
    }

    /// Parse, apply environment overrides and validate
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: FeedConfig = serde_yaml::from_str(yaml)?;

        if let Ok(url) = std::env::var(WS_URL_ENV) {
            info!("Overriding WebSocket URL from environment variable");
            config.ws_url = url;
        }
        if let Ok(url) = std::env::var(REST_URL_ENV) {
            info!("Overriding REST URL from environment variable");
            config.rest_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(
                "ws_url must start with ws:// or wss://".to_string(),
            ));
        }
        if self.rest_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rest_url cannot be empty".to_string(),
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.reconnect_initial_delay_ms == 0
            || self.reconnect_max_delay_ms < self.reconnect_initial_delay_ms
        {
            return Err(ConfigError::ValidationError(
                "reconnect delays must satisfy 0 < initial <= max".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }

        for market in &self.markets {
            if market.market.is_empty() || market.yes_token.is_empty() || market.no_token.is_empty() {
                return Err(ConfigError::ValidationError(
                    "markets entries need market, yes_token and no_token".to_string(),
                ));
            }
            if market.yes_token == market.no_token {
                return Err(ConfigError::ValidationError(format!(
                    "market {} uses the same token for both outcomes",
                    market.market
                )));
            }
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Exponential backoff with the configured delays and ceiling
    pub fn reconnect_strategy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.reconnect_initial_delay_ms),
            Duration::from_millis(self.reconnect_max_delay_ms),
            Some(self.max_reconnect_attempts),
        )
    }

    /// Instruments for every configured market
    pub fn instruments(&self) -> Vec<Instrument> {
        self.markets
            .iter()
            .flat_map(|m| Instrument::binary_market(m.market.clone(), m.yes_token.clone(), m.no_token.clone()))
            .collect()
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  WebSocket URL: {}", self.ws_url);
        info!("  REST URL: {}", self.rest_url);
        info!(
            "  Heartbeat: every {}s ({:?})",
            self.heartbeat_interval_secs, self.heartbeat_payload
        );
        info!("  Connect timeout: {}s", self.connect_timeout_secs);
        info!(
            "  Reconnect: {}ms..{}ms, {} attempts",
            self.reconnect_initial_delay_ms, self.reconnect_max_delay_ms, self.max_reconnect_attempts
        );
        info!("  Seed last trades: {}", self.seed_last_trades);
        info!("  Poll interval: {}s", self.poll_interval_secs);
        info!("  Log level: {}", self.log_level);
        info!("  Markets: {}", self.markets.len());
    }
}
