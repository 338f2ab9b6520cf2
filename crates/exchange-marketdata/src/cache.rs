//! Short-lived per-symbol quote cache.
//!
//! Entries live slightly less than one poll interval so a render cycle never
//! issues the same request twice, while the next cycle always refetches.
//! The TTL follows configuration reloads; a zero TTL disables caching.

use calendar_core::Quote;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct QuoteCache {
    ttl: Mutex<Duration>,
    entries: Mutex<HashMap<String, (Instant, Quote)>>,
}

impl QuoteCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: Mutex::new(ttl),
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        *self.ttl.lock()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.ttl().is_zero()
    }

    /// Replaces the TTL. Existing entries are judged against the new value.
    pub fn set_ttl(&self, ttl: Duration) {
        *self.ttl.lock() = ttl;
        if ttl.is_zero() {
            self.clear();
        }
    }

    /// Returns the cached quote if it is younger than the TTL.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        self.get_at(symbol, Instant::now())
    }

    pub fn insert(&self, symbol: &str, quote: Quote) {
        self.insert_at(symbol, quote, Instant::now());
    }

    fn get_at(&self, symbol: &str, now: Instant) -> Option<Quote> {
        let ttl = self.ttl();
        let mut entries = self.entries.lock();
        match entries.get(symbol) {
            Some((stored_at, quote)) if now.duration_since(*stored_at) < ttl => Some(*quote),
            Some(_) => {
                entries.remove(symbol);
                None
            }
            None => None,
        }
    }

    fn insert_at(&self, symbol: &str, quote: Quote, now: Instant) {
        if !self.is_enabled() {
            return;
        }
        self.entries.lock().insert(symbol.to_string(), (now, quote));
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
