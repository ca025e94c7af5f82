//! Book watcher
//!
//! Streams the configured markets and logs their prices on a fixed cadence.

use anyhow::Result;
use hypersockets::ClientEvent;
use polymarket_book_sync::bin_common::{load_config_from_env, ConfigType};
use polymarket_book_sync::booksync::{
    init_tracing, BookSyncEngine, FeedConfig, InstrumentKey, RestClient, ShutdownManager,
    SubscriptionPort,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load config first (before logging is initialized)
    let config_path = load_config_from_env(ConfigType::BookSync);
    let config = FeedConfig::load(&config_path)?;

    init_tracing(&config.log_level);
    config.log();

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let engine = BookSyncEngine::new(config.clone());

    if config.seed_last_trades {
        let rest = RestClient::new(config.rest_url.clone())?;
        match engine.seed_last_trades(&rest).await {
            Ok(count) => info!("Seeded {} last trades over REST", count),
            Err(e) => warn!("Last-trade seeding failed, continuing with stream only: {}", e),
        }
    }

    engine.start().await?;
    print_banner(&config);

    let keys: Vec<InstrumentKey> = config
        .markets
        .iter()
        .map(|m| InstrumentKey::yes(m.market.clone()))
        .collect();

    let retry_requested = spawn_retry_listener();

    while shutdown.is_running() {
        for event in engine.drain_events() {
            if let ClientEvent::Failed { attempts } = event {
                error!(
                    "Feed gave up after {} attempts, books are stale. Type 'r' + Enter to reconnect",
                    attempts
                );
            }
        }

        // Reconnect only on an explicit operator request
        if retry_requested.swap(false, Ordering::AcqRel) {
            if let Err(e) = engine.retry() {
                warn!("Manual retry rejected: {}", e);
            }
        }

        info!("[{}]", engine.connection_state());
        for key in &keys {
            log_market(&engine, key);
        }

        shutdown.interruptible_sleep(config.poll_interval()).await;
    }

    engine.stop().await?;
    print_shutdown();
    Ok(())
}

/// Set a flag whenever the operator types `r` on stdin
fn spawn_retry_listener() -> Arc<AtomicBool> {
    let requested = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&requested);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().eq_ignore_ascii_case("r") {
                info!("Manual reconnect requested");
                flag.store(true, Ordering::Release);
            }
        }
    });

    requested
}

fn log_market(engine: &BookSyncEngine, yes: &InstrumentKey) {
    let no = yes.complement();
    let fmt = |v: Option<Decimal>| v.map_or("N/A".to_string(), |p| p.round_dp(4).to_string());

    info!(
        "{} | YES mid {} | NO mid {} (implied {})",
        yes.market,
        fmt(engine.mid_price(yes)),
        fmt(engine.mid_price(&no)),
        fmt(engine.implied_mid_price(&no)),
    );
    if let Some(book) = engine.get_book(yes) {
        info!("  {}", book.format_summary());
    }
}

fn print_banner(config: &FeedConfig) {
    info!("");
    info!("========================================");
    info!("Starting Book Watch");
    info!("Markets: {}", config.markets.len());
    info!("Poll interval: {}s", config.poll_interval_secs);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown() {
    info!("");
    info!("========================================");
    info!("Book watch stopped gracefully");
    info!("========================================");
}
