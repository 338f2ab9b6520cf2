//! Evaluation snapshots handed to the report.

use calendar_core::{AlertState, OptionClass};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::valuation::PlResult;

/// Days before the final adjustment date at which the countdown turns urgent.
pub const FAD_URGENT_DAYS: i64 = 7;

/// One leg as evaluated in a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegSnapshot {
    pub name: String,
    pub display_name: String,
    pub class: OptionClass,
    pub strike: Decimal,
    /// Instrument ids; `None` when the id could not be built.
    pub front_symbol: Option<String>,
    pub back_symbol: Option<String>,
    pub td_price_front: Decimal,
    pub td_price_back: Decimal,
    pub now_price_front: Decimal,
    pub now_price_back: Decimal,
    pub back_iv: Option<f64>,
    pub valuation: PlResult,
    pub alert_target: Decimal,
    pub alert: AlertState,
    /// Whether any quote for this leg failed and zeros were used.
    pub degraded: bool,
    /// P/L history, oldest first.
    pub history: Vec<Decimal>,
}

/// Days left until the final adjustment date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FadCountdown {
    pub date: NaiveDate,
    pub days_left: i64,
}

impl FadCountdown {
    #[must_use]
    pub fn new(date: NaiveDate, today: NaiveDate) -> Self {
        Self {
            date,
            days_left: (date - today).num_days(),
        }
    }

    #[must_use]
    pub fn is_urgent(&self) -> bool {
        self.days_left <= FAD_URGENT_DAYS
    }
}

/// A position as evaluated in a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub ticker: String,
    pub legs: Vec<LegSnapshot>,
    pub total_pl_percent: Decimal,
    /// Current back-leg volatility in percent; zero when unavailable.
    pub back_vol: Decimal,
    /// Legs whose back IV contributed to `back_vol`.
    pub back_vol_sources: usize,
    pub td_back_vol: Option<Decimal>,
    pub back_vol_history: Vec<Decimal>,
    pub fad: FadCountdown,
    /// Alerts produced this cycle, delivered or not.
    pub alerts_fired: usize,
}

impl PositionSnapshot {
    /// True when `back_vol` averages only some of the legs.
    #[must_use]
    pub fn back_vol_is_partial(&self) -> bool {
        self.back_vol_sources > 0 && self.back_vol_sources < self.legs.len()
    }
}

/// Outcome of one monitoring cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub snapshots: Vec<PositionSnapshot>,
    pub persisted: bool,
}
