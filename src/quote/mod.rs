//! Quote sources
//!
//! A quote source produces the current price for a named instrument. The
//! production source is HTTP polling; tests script their own.

mod http;

pub use http::HttpQuoteSource;

use crate::types::Instrument;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from a single quote fetch. None of these are fatal: the caller
/// keeps its last known price and tries again on the next cycle.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Quote endpoint returned {0}")]
    Status(reqwest::StatusCode),
    #[error("Malformed price payload: {0:?}")]
    Malformed(String),
}

/// A source of current prices for named instruments
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Get the source name for logging
    fn name(&self) -> &'static str;

    /// Fetch the current price for one instrument
    async fn latest_price(&self, instrument: &Instrument) -> Result<f64, QuoteError>;
}

/// Parse a plain-text price payload. Rejects NaN, infinities and negative
/// values; surrounding whitespace is tolerated.
pub fn parse_price(body: &str) -> Result<f64, QuoteError> {
    let trimmed = body.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(QuoteError::Malformed(trimmed.chars().take(64).collect())),
    }
}
