//! HTTP quote source
//!
//! Fetches plain-text prices from `{endpoint}?mode=getPrice&company={symbol}`.

use super::{parse_price, QuoteError, QuoteSource};
use crate::types::Instrument;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use reqwest::Client;

/// Quote source backed by a plain-text HTTP endpoint
pub struct HttpQuoteSource {
    client: Client,
    endpoint: String,
}

impl HttpQuoteSource {
    /// Create a source against the given endpoint. Requests carry
    /// `Cache-Control: no-store` so intermediaries never serve a stale
    /// quote. No request timeout is set; a stalled fetch blocks only its
    /// own poll slot.
    pub fn new(endpoint: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn latest_price(&self, instrument: &Instrument) -> Result<f64, QuoteError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("mode", "getPrice"), ("company", instrument.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuoteError::Status(status));
        }

        let body = response.text().await?;
        parse_price(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let source = HttpQuoteSource::new("http://127.0.0.1:8787/quote/");
        assert_eq!(source.endpoint(), "http://127.0.0.1:8787/quote");
    }
}
