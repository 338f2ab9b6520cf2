//! Double calendar management.
//!
//! Runs as a long-lived service that:
//! - Loads registered double calendars from the store
//! - Quotes every front/back leg and values each calendar
//! - Sends one alert per profit target crossing
//! - Records per-minute P/L and back-leg volatility history
//! - Persists the updated positions and renders a text dashboard
//!
//! Also hosts the validated create/adjust/delete operations used by the CLI.

pub mod alerts;
pub mod monitor;
pub mod positions;
pub mod report;
pub mod service;
pub mod types;
pub mod valuation;

pub use monitor::evaluate_position;
pub use positions::{NewLeg, NewPosition, PositionError, PositionManager};
pub use report::ReportFormatter;
pub use service::MonitorService;
pub use types::{CycleReport, FadCountdown, LegSnapshot, PositionSnapshot};
pub use valuation::{PlResult, value};
