//! Configuration management for Tickerpad
//!
//! Programmatic defaults, overridable by optional config files and
//! TICKERPAD__-prefixed environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub desk: DeskConfig,
    pub quotes: QuotesConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeskConfig {
    /// Instrument symbol this session trades
    pub instrument: String,
    /// Seed price when the store has none
    pub seed_price: f64,
    /// Seed cash balance when the store has none
    pub seed_cash: f64,
    /// Seed share count when the store has none
    pub seed_shares: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotesConfig {
    /// Quote endpoint URL
    pub endpoint: String,
    /// Poll period in milliseconds
    pub poll_period_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the store file
    pub data_dir: String,
}

impl AppConfig {
    /// Load configuration from defaults, files and environment
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            // Desk defaults
            .set_default("desk.instrument", "ACME")?
            .set_default("desk.seed_price", 522.0)?
            .set_default("desk.seed_cash", 100_000.0)?
            .set_default("desk.seed_shares", 0)?
            // Quote defaults
            .set_default("quotes.endpoint", "http://127.0.0.1:8787/quote")?
            .set_default("quotes.poll_period_ms", 2000)?
            // Store defaults
            .set_default("store.data_dir", "./data")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (TICKERPAD_*)
            .add_source(Environment::with_prefix("TICKERPAD").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "instrument={} endpoint={} poll_ms={} data_dir={}",
            self.desk.instrument,
            self.quotes.endpoint,
            self.quotes.poll_period_ms,
            self.store.data_dir
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
