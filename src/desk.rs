//! Trading desk
//!
//! Holds one instrument's portfolio state and executes buys and sells at
//! the current price. Every change is mirrored into the injected key-value
//! store, and a one-way latch keeps trading closed until the first
//! successful price fetch.

use crate::config::DeskConfig;
use crate::store::{KeyValueStore, CASH_KEY};
use crate::types::{Instrument, PortfolioSnapshot, TradeReceipt, TradeSide};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Trade rejections. State is untouched for all of them.
#[derive(Debug, Error, PartialEq)]
pub enum TradeError {
    #[error("Enter a valid number of shares")]
    InvalidQuantity,
    #[error("Trading is disabled until the first price fetch succeeds")]
    TradingDisabled,
    #[error("Not enough cash: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },
    #[error("You don't own that many shares: requested {requested}, held {held}")]
    InsufficientShares { requested: u64, held: u64 },
}

/// Fallback values used when the store has no usable entry for a field
#[derive(Debug, Clone, Copy)]
pub struct PortfolioSeeds {
    pub price: f64,
    pub cash: f64,
    pub shares: u64,
}

impl Default for PortfolioSeeds {
    fn default() -> Self {
        Self {
            price: 522.0,
            cash: 100_000.0,
            shares: 0,
        }
    }
}

impl From<&DeskConfig> for PortfolioSeeds {
    fn from(cfg: &DeskConfig) -> Self {
        Self {
            price: cfg.seed_price,
            cash: cfg.seed_cash,
            shares: cfg.seed_shares,
        }
    }
}

/// Portfolio state and trade execution for a single instrument
pub struct TradingDesk {
    instrument: Instrument,
    price: RwLock<f64>,
    cash: RwLock<f64>,
    shares: RwLock<u64>,
    trading_enabled: AtomicBool,
    store: Arc<dyn KeyValueStore>,
    snapshot_tx: broadcast::Sender<PortfolioSnapshot>,
}

impl TradingDesk {
    /// Build a desk from whatever the store holds, falling back to seeds
    /// for absent or unparsable entries. Loading never writes.
    pub fn new(
        instrument: Instrument,
        seeds: PortfolioSeeds,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let price = read_f64(store.as_ref(), &instrument.price_key()).unwrap_or(seeds.price);
        let cash = read_f64(store.as_ref(), CASH_KEY).unwrap_or(seeds.cash);
        let shares = read_u64(store.as_ref(), &instrument.shares_key()).unwrap_or(seeds.shares);

        // Receiver dropped immediately; subscribers attach later.
        let (snapshot_tx, _) = broadcast::channel(64);

        info!(
            instrument = %instrument,
            price = price,
            cash = cash,
            shares = shares,
            "💾 Portfolio state loaded"
        );

        Self {
            instrument,
            price: RwLock::new(price),
            cash: RwLock::new(cash),
            shares: RwLock::new(shares),
            trading_enabled: AtomicBool::new(false),
            store,
            snapshot_tx,
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn price(&self) -> f64 {
        *self.price.read().unwrap()
    }

    pub fn cash(&self) -> f64 {
        *self.cash.read().unwrap()
    }

    pub fn shares(&self) -> u64 {
        *self.shares.read().unwrap()
    }

    pub fn trading_enabled(&self) -> bool {
        self.trading_enabled.load(Ordering::SeqCst)
    }

    /// Subscribe to snapshot updates (price changes, trades, latch opening)
    pub fn subscribe(&self) -> broadcast::Receiver<PortfolioSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            instrument: self.instrument.clone(),
            price: self.price(),
            cash: self.cash(),
            shares: self.shares(),
            trading_enabled: self.trading_enabled(),
        }
    }

    /// Record a freshly fetched price. Returns true when the value differed
    /// and was written through; an identical value writes nothing.
    pub fn apply_price(&self, value: f64) -> bool {
        {
            let mut price = self.price.write().unwrap();
            if *price == value {
                return false;
            }
            *price = value;
        }

        self.write_through(&self.instrument.price_key(), &value.to_string());
        self.publish();
        true
    }

    /// Open the trading latch. Returns true on the transition only; the
    /// latch never closes again for the lifetime of the desk.
    pub fn enable_trading(&self) -> bool {
        let opened = !self.trading_enabled.swap(true, Ordering::SeqCst);
        if opened {
            info!(instrument = %self.instrument, "✅ Trading enabled");
            self.publish();
        }
        opened
    }

    /// Buy `quantity` shares at the current price
    pub fn buy(&self, quantity: u64) -> Result<TradeReceipt, TradeError> {
        self.execute(TradeSide::Buy, quantity)
    }

    /// Sell `quantity` shares at the current price
    pub fn sell(&self, quantity: u64) -> Result<TradeReceipt, TradeError> {
        self.execute(TradeSide::Sell, quantity)
    }

    fn execute(&self, side: TradeSide, quantity: u64) -> Result<TradeReceipt, TradeError> {
        if quantity == 0 {
            return Err(TradeError::InvalidQuantity);
        }
        if !self.trading_enabled() {
            return Err(TradeError::TradingDisabled);
        }

        let unit_price = self.price();
        let gross = quantity as f64 * unit_price;

        let (cash_after, shares_after) = {
            let mut cash = self.cash.write().unwrap();
            let mut shares = self.shares.write().unwrap();

            match side {
                TradeSide::Buy => {
                    // Spending the exact balance is allowed.
                    if gross > *cash {
                        return Err(TradeError::InsufficientFunds {
                            needed: gross,
                            available: *cash,
                        });
                    }
                    *cash -= gross;
                    *shares += quantity;
                }
                TradeSide::Sell => {
                    if quantity > *shares {
                        return Err(TradeError::InsufficientShares {
                            requested: quantity,
                            held: *shares,
                        });
                    }
                    *shares -= quantity;
                    *cash += gross;
                }
            }

            (*cash, *shares)
        };

        self.write_through(CASH_KEY, &cash_after.to_string());
        self.write_through(&self.instrument.shares_key(), &shares_after.to_string());
        self.publish();

        let receipt = TradeReceipt {
            id: Uuid::new_v4().to_string(),
            instrument: self.instrument.clone(),
            side,
            quantity,
            unit_price,
            gross,
            cash_after,
            shares_after,
            executed_at: Utc::now().timestamp_millis(),
        };

        info!(
            instrument = %receipt.instrument,
            side = %receipt.side,
            quantity = receipt.quantity,
            unit_price = receipt.unit_price,
            gross = receipt.gross,
            cash_after = receipt.cash_after,
            shares_after = receipt.shares_after,
            "✅ Trade executed"
        );

        Ok(receipt)
    }

    fn write_through(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            error!(
                instrument = %self.instrument,
                key = %key,
                error = %e,
                "Failed to persist value, keeping in-memory state"
            );
        }
    }

    fn publish(&self) {
        // Ignore send errors (no receivers is fine)
        let _ = self.snapshot_tx.send(self.snapshot());
    }
}

fn read_f64(store: &dyn KeyValueStore, key: &str) -> Option<f64> {
    let value = store.get(key)?;
    match value.trim().parse::<f64>() {
        Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => Some(parsed),
        _ => {
            warn!(key = %key, value = %value, "Ignoring unparsable stored value");
            None
        }
    }
}

fn read_u64(store: &dyn KeyValueStore, key: &str) -> Option<u64> {
    let value = store.get(key)?;
    match value.trim().parse::<u64>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key = %key, value = %value, "Ignoring unparsable stored value");
            None
        }
    }
}
