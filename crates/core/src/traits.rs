use crate::events::{AlertRequest, Quote};
use crate::position::Position;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Source of option quotes keyed by instrument id.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote>;

    /// Sets how long a fetched quote may be reused. Uncached sources ignore it.
    fn set_cache_ttl(&self, _ttl: Duration) {}
}

/// Keyed durable storage of positions.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// All positions keyed by ticker.
    async fn list(&self) -> Result<BTreeMap<String, Position>>;
    async fn upsert(&self, ticker: &str, position: &Position) -> Result<()>;
    async fn delete(&self, ticker: &str) -> Result<()>;

    /// Writes back positions evaluated in a cycle and returns how many were written.
    ///
    /// A position is written only while the store still holds it at the same
    /// revision, so positions removed or edited meanwhile are left alone.
    /// Backends may override with an atomic batch write.
    async fn update_all(&self, positions: &BTreeMap<String, Position>) -> Result<usize> {
        let stored = self.list().await?;
        let mut written = 0;
        for (ticker, position) in positions {
            if stored.get(ticker).map(|p| p.revision) == Some(position.revision) {
                self.upsert(ticker, position).await?;
                written += 1;
            }
        }
        Ok(written)
    }
}

/// Best-effort delivery of profit alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &AlertRequest) -> Result<()>;
}
