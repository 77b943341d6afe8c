//! Core types used throughout Tickerpad
//!
//! Defines the instrument symbol, trade records and portfolio snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tradable instrument symbol (e.g. "ACME")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key holding this instrument's last known price
    pub fn price_key(&self) -> String {
        format!("{}_price", self.0)
    }

    /// Store key holding this instrument's held share count
    pub fn shares_key(&self) -> String {
        format!("{}_shares", self.0)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Instrument {
    fn from(symbol: &str) -> Self {
        Self(symbol.to_string())
    }
}

/// Direction of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(TradeSide::Buy),
            "sell" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Record of an executed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    /// Unique receipt ID
    pub id: String,
    pub instrument: Instrument,
    pub side: TradeSide,
    /// Number of shares traded
    pub quantity: u64,
    /// Price per share at execution
    pub unit_price: f64,
    /// Total cash moved (quantity x unit price)
    pub gross: f64,
    /// Cash balance after the trade
    pub cash_after: f64,
    /// Share count after the trade
    pub shares_after: u64,
    /// Execution timestamp (milliseconds)
    pub executed_at: i64,
}

/// Point-in-time view of the portfolio, published on every change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub instrument: Instrument,
    pub price: f64,
    pub cash: f64,
    pub shares: u64,
    /// False until the first successful price fetch
    pub trading_enabled: bool,
}

impl PortfolioSnapshot {
    /// Cash plus market value of held shares
    pub fn total_value(&self) -> f64 {
        self.cash + self.shares as f64 * self.price
    }
}
