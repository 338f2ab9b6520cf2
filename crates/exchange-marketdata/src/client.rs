//! Option quotes REST client with rate limiting and a TTL cache.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calendar_core::{MarketDataConfig, Quote, QuoteSource};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{header::ACCEPT, Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::debug;

use crate::cache::QuoteCache;
use crate::models::QuotesResponse;

/// Default market data API base URL.
pub const MARKET_DATA_URL: &str = calendar_core::config::DEFAULT_MARKET_DATA_URL;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Why a quote could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    /// No API token configured; nothing was requested.
    #[error("market data token is not configured")]
    MissingCredentials,

    /// Empty instrument id; nothing was requested.
    #[error("option symbol is empty")]
    MissingSymbol,

    /// Upstream rejected the id (HTTP 400).
    #[error("invalid option symbol: {0}")]
    InvalidSymbol(String),

    /// Upstream answered but had no data for the id.
    #[error("no data for option symbol: {0}")]
    NoData(String),

    /// Transport failure, non-2xx status, or undecodable body.
    #[error("market data unavailable: {0}")]
    Unavailable(String),
}

/// Market data REST client.
pub struct MarketDataClient {
    http: Client,
    base_url: String,
    token: Option<SecretString>,
    cache: QuoteCache,
    rate_limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for MarketDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.is_some())
            .field("cache_ttl", &self.cache.ttl())
            .finish_non_exhaustive()
    }
}

impl MarketDataClient {
    /// Creates a client without caching, limited to 100 requests per minute.
    pub fn new(token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: MARKET_DATA_URL.to_string(),
            token: token
                .filter(|t| !t.trim().is_empty())
                .map(SecretString::from),
            cache: QuoteCache::new(Duration::ZERO),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(nonzero!(100u32)))),
        }
    }

    /// Builds a client from configuration with the given cache TTL.
    pub fn from_config(config: &MarketDataConfig, cache_ttl: Duration) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        let rpm = NonZeroU32::new(config.requests_per_minute).unwrap_or(nonzero!(100u32));

        Self {
            http,
            ..Self::new(config.token.clone())
        }
        .with_base_url(&config.base_url)
        .with_rate_limit(rpm)
        .with_cache_ttl(cache_ttl)
    }

    /// Sets a custom base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.base_url = url;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: NonZeroU32) -> Self {
        self.rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(requests_per_minute)));
        self
    }

    /// Enables the quote cache. A zero TTL disables it.
    #[must_use]
    pub fn with_cache_ttl(self, ttl: Duration) -> Self {
        self.cache.set_ttl(ttl);
        self
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.token.is_some()
    }

    /// Fetches one option quote.
    ///
    /// # Errors
    /// See [`QuoteError`] for the mapping of every failure.
    pub async fn fetch(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let token = self.token.as_ref().ok_or(QuoteError::MissingCredentials)?;
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(QuoteError::MissingSymbol);
        }

        if let Some(quote) = self.cache.get(symbol) {
            debug!(symbol, "Quote cache hit");
            return Ok(quote);
        }

        self.rate_limiter.until_ready().await;

        let url = format!(
            "{}options/quotes/{}/",
            self.base_url,
            urlencoding::encode(symbol)
        );
        debug!(url = %url, "GET option quote");

        let response = self
            .http
            .get(&url)
            .query(&[("token", token.expose_secret())])
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| QuoteError::Unavailable(e.without_url().to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Err(QuoteError::InvalidSymbol(symbol.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(QuoteError::Unavailable(format!("HTTP {status}: {text}")));
        }

        let body: QuotesResponse = response
            .json()
            .await
            .map_err(|e| QuoteError::Unavailable(e.without_url().to_string()))?;

        if !body.is_ok() {
            debug!(symbol, status = %body.status, errmsg = ?body.errmsg, "No quote data");
            return Err(QuoteError::NoData(symbol.to_string()));
        }

        let quote = body.to_quote();
        self.cache.insert(symbol, quote);
        Ok(quote)
    }
}

#[async_trait]
impl QuoteSource for MarketDataClient {
    async fn quote(&self, symbol: &str) -> anyhow::Result<Quote> {
        Ok(self.fetch(symbol).await?)
    }

    fn set_cache_ttl(&self, ttl: Duration) {
        if ttl != self.cache.ttl() {
            debug!(ttl_secs = ttl.as_secs(), "Quote cache TTL updated");
            self.cache.set_ttl(ttl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SYMBOL: &str = "PETR240315P00035500";

    fn client(server: &MockServer) -> MarketDataClient {
        MarketDataClient::new(Some("test-token".to_string())).with_base_url(server.uri())
    }

    #[test]
    fn test_client_defaults() {
        let client = MarketDataClient::new(None);
        assert_eq!(client.base_url(), MARKET_DATA_URL);
        assert!(!client.has_credentials());
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = MarketDataClient::new(None).with_base_url("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080/");
    }

    #[test]
    fn test_debug_does_not_expose_token() {
        let client = MarketDataClient::new(Some("super-secret".to_string()));
        assert!(!format!("{client:?}").contains("super-secret"));
    }

    #[tokio::test]
    async fn test_missing_credentials_short_circuits() {
        let server = MockServer::start().await;
        let client = MarketDataClient::new(None).with_base_url(server.uri());
        assert_eq!(
            client.fetch(SYMBOL).await.unwrap_err(),
            QuoteError::MissingCredentials
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_symbol_short_circuits() {
        let server = MockServer::start().await;
        assert_eq!(
            client(&server).fetch("  ").await.unwrap_err(),
            QuoteError::MissingSymbol
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/options/quotes/{SYMBOL}/")))
            .and(query_param("token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "s": "ok",
                "last": [1.37],
                "iv": [0.512]
            })))
            .mount(&server)
            .await;

        let quote = client(&server).fetch(SYMBOL).await.unwrap();
        assert_eq!(quote.last_price, Some(dec!(1.37)));
        assert_eq!(quote.implied_vol, Some(0.512));
    }

    #[tokio::test]
    async fn test_bad_request_maps_to_invalid_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "s": "error",
                "errmsg": "Invalid option symbol"
            })))
            .mount(&server)
            .await;

        assert_eq!(
            client(&server).fetch(SYMBOL).await.unwrap_err(),
            QuoteError::InvalidSymbol(SYMBOL.to_string())
        );
    }

    #[tokio::test]
    async fn test_server_error_maps_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server).fetch(SYMBOL).await.unwrap_err();
        assert!(matches!(err, QuoteError::Unavailable(ref d) if d.contains("503")));
    }

    #[tokio::test]
    async fn test_not_ok_status_maps_to_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "s": "no_data"
            })))
            .mount(&server)
            .await;

        assert_eq!(
            client(&server).fetch(SYMBOL).await.unwrap_err(),
            QuoteError::NoData(SYMBOL.to_string())
        );
    }

    #[tokio::test]
    async fn test_garbage_body_maps_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        assert!(matches!(
            client(&server).fetch(SYMBOL).await.unwrap_err(),
            QuoteError::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_cache_avoids_second_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "s": "ok",
                "last": [2.0],
                "iv": [0.25]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).with_cache_ttl(Duration::from_secs(60));
        let first = client.fetch(SYMBOL).await.unwrap();
        let second = client.fetch(SYMBOL).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_disabled_cache_refetches_after_ttl_change() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "s": "ok",
                "last": [2.0],
                "iv": [0.25]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server).with_cache_ttl(Duration::from_secs(290));
        client.fetch(SYMBOL).await.unwrap();
        client.set_cache_ttl(Duration::ZERO);
        assert_eq!(client.cache_ttl(), Duration::ZERO);
        client.fetch(SYMBOL).await.unwrap();
    }

    #[tokio::test]
    async fn test_quote_source_impl_wraps_errors() {
        let client = MarketDataClient::new(None);
        let err = client.quote(SYMBOL).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<QuoteError>(),
            Some(&QuoteError::MissingCredentials)
        );
    }
}
