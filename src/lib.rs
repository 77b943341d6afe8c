//! Tickerpad Library
//!
//! Simulated trading desk for a single polled instrument: a background
//! price poller feeding a buy/sell executor, with write-through portfolio
//! persistence.

pub mod config;
pub mod desk;
pub mod poller;
pub mod quote;
pub mod store;
pub mod types;
