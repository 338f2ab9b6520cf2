//! Core types, configuration, and seams for the double calendar monitor.

pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod events;
pub mod history;
pub mod position;
pub mod symbol;
pub mod traits;

pub use config::{
    AppConfig, MarketDataConfig, MonitorConfig, StorageBackend, StorageConfig, TelegramConfig,
};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use events::{AlertRequest, Quote};
pub use history::{minute_label, History, HistoryPoint, Series};
pub use position::{AlertState, CalendarLeg, OptionClass, Position, CALL_LEG, PUT_LEG};
pub use symbol::SymbolError;
pub use traits::{Notifier, PositionStore, QuoteSource};
