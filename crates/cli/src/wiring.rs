//! Builds the store, quote source and notifier selected by configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use calendar_core::{AppConfig, Notifier, PositionStore, QuoteSource, StorageBackend};
use calendar_data::{JsonFileStore, PgPositionStore};
use calendar_marketdata::MarketDataClient;
use calendar_telegram::{LogNotifier, NotifyError, TelegramNotifier};

/// Opens the configured position store.
///
/// # Errors
/// Returns an error if the PostgreSQL backend is selected without a URL or cannot connect.
pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn PositionStore>> {
    match config.storage.backend {
        StorageBackend::Json => {
            tracing::info!(path = %config.storage.json_path.display(), "Using JSON position store");
            Ok(Arc::new(JsonFileStore::new(&config.storage.json_path)))
        }
        StorageBackend::Postgres => {
            let url = config
                .storage
                .database_url
                .as_deref()
                .context("storage.database_url is required for the postgres backend")?;
            let store = PgPositionStore::connect(url, config.storage.max_connections)
                .await
                .context("Failed to connect to position database")?;
            tracing::info!("Using PostgreSQL position store");
            Ok(Arc::new(store))
        }
    }
}

pub fn build_quotes(config: &AppConfig) -> Arc<dyn QuoteSource> {
    let ttl = Duration::from_secs(config.quote_cache_ttl_secs());
    let client = MarketDataClient::from_config(&config.market_data, ttl);
    if !client.has_credentials() {
        tracing::warn!("No market data token configured, every leg will value at zero");
    }
    Arc::new(client)
}

/// Telegram when configured, otherwise alerts only reach the log.
pub fn build_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    match TelegramNotifier::from_config(&config.telegram) {
        Ok(notifier) => Arc::new(notifier),
        Err(NotifyError::NotConfigured) => {
            tracing::warn!("Telegram not configured, profit alerts will only be logged");
            Arc::new(LogNotifier)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Telegram unavailable, profit alerts will only be logged");
            Arc::new(LogNotifier)
        }
    }
}
