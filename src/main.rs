//! Tickerpad session binary
//!
//! Wires the store, desk and poller together behind a line-oriented command
//! loop: `buy N`, `sell N`, `refresh`, `quit`. The portfolio board reprints
//! whenever a snapshot lands.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tickerpad::config::AppConfig;
use tickerpad::desk::{PortfolioSeeds, TradingDesk};
use tickerpad::poller::{PollOutcome, PollerHandle, PollerRegistry};
use tickerpad::quote::HttpQuoteSource;
use tickerpad::store::FileStore;
use tickerpad::types::{Instrument, PortfolioSnapshot, TradeSide};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::load()?;
    info!(config = %config.digest(), "🚀 Tickerpad starting");

    let store_path = PathBuf::from(&config.store.data_dir).join("portfolio_store.json");
    let store = Arc::new(FileStore::open(store_path)?);

    let desk = Arc::new(TradingDesk::new(
        Instrument::new(&config.desk.instrument),
        PortfolioSeeds::from(&config.desk),
        store,
    ));

    // Subscribe before the poller starts so the first refresh is not missed.
    let mut snapshots = desk.subscribe();

    let registry = PollerRegistry::new();
    let source = Arc::new(HttpQuoteSource::new(&config.quotes.endpoint));
    let poller = registry.spawn(
        desk.clone(),
        source,
        Duration::from_millis(config.quotes.poll_period_ms),
    );

    // Cached state is shown before the first fetch lands.
    render(&desk.snapshot());
    println!("commands: buy <qty> | sell <qty> | refresh | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => {
                match snapshot {
                    Ok(snapshot) => render(&snapshot),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Display fell behind snapshot updates");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(command) => {
                        if !run_command(&desk, &poller, command.trim()).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    registry.shutdown();
    Ok(())
}

/// Returns false when the session should end
async fn run_command(desk: &TradingDesk, poller: &PollerHandle, command: &str) -> bool {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("buy") => trade(desk, TradeSide::Buy, parts.next()),
        Some("sell") => trade(desk, TradeSide::Sell, parts.next()),
        Some("refresh") => match poller.refresh_now().await {
            PollOutcome::Refreshed(price) => println!("price refreshed: {:.2}", price),
            PollOutcome::Unchanged(price) => println!("price unchanged: {:.2}", price),
            PollOutcome::Failed => println!("quote fetch failed, keeping last price"),
            PollOutcome::InFlight => println!("a fetch is already running"),
        },
        Some("quit") | Some("exit") => return false,
        Some(other) => println!("unknown command: {}", other),
        None => {}
    }
    true
}

fn trade(desk: &TradingDesk, side: TradeSide, quantity: Option<&str>) {
    let Some(quantity) = quantity.and_then(|q| q.parse::<u64>().ok()) else {
        println!("Enter a valid number of shares");
        return;
    };

    let result = match side {
        TradeSide::Buy => desk.buy(quantity),
        TradeSide::Sell => desk.sell(quantity),
    };

    match result {
        Ok(receipt) => println!(
            "{} {} {} @ {:.2} ({:.2})",
            receipt.side, receipt.quantity, receipt.instrument, receipt.unit_price, receipt.gross
        ),
        Err(e) => println!("{}", e),
    }
}

fn render(snapshot: &PortfolioSnapshot) {
    let gate = if snapshot.trading_enabled {
        ""
    } else {
        "  [trading disabled until first quote]"
    };
    println!(
        "{}  price {:.2}  cash {:.2}  shares {}  total {:.2}{}",
        snapshot.instrument,
        snapshot.price,
        snapshot.cash,
        snapshot.shares,
        snapshot.total_value(),
        gate
    );
}
