use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default market data endpoint (note the trailing slash, paths are appended).
pub const DEFAULT_MARKET_DATA_URL: &str = "https://api.marketdata.app/v1/";
/// Default Telegram Bot API endpoint.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
/// Default poll interval between monitor cycles.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub market_data: MarketDataConfig,
    pub telegram: TelegramConfig,
    pub monitor: MonitorConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub base_url: String,
    /// API token; quote fetches short-circuit when absent.
    pub token: Option<String>,
    /// Quote cache TTL. `None` derives it from the poll interval.
    pub cache_ttl_secs: Option<u64>,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MARKET_DATA_URL.to_string(),
            token: None,
            cache_ttl_secs: None,
            requests_per_minute: 100,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            bot_token: None,
            chat_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl MonitorConfig {
    /// Cache TTL slightly shorter than the poll interval so every cycle sees fresh quotes.
    #[must_use]
    pub fn default_cache_ttl_secs(&self) -> u64 {
        self.poll_interval_secs.saturating_sub(10).max(1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub json_path: PathBuf,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            json_path: PathBuf::from("data/calendars_db.json"),
            database_url: None,
            max_connections: 5,
        }
    }
}

impl AppConfig {
    /// Effective quote cache TTL in seconds, never longer than one poll interval.
    #[must_use]
    pub fn quote_cache_ttl_secs(&self) -> u64 {
        self.market_data
            .cache_ttl_secs
            .unwrap_or_else(|| self.monitor.default_cache_ttl_secs())
            .min(self.monitor.poll_interval_secs.max(1))
    }
}
