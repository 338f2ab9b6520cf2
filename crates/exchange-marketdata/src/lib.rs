//! Market data integration for option quotes.
//!
//! Fetches last price and implied volatility for OCC-style option ids from
//! the `options/quotes` endpoint, with client-side rate limiting and a short
//! per-symbol cache.

pub mod cache;
pub mod client;
pub mod models;

pub use cache::QuoteCache;
pub use client::{MarketDataClient, QuoteError, MARKET_DATA_URL};
pub use models::QuotesResponse;
