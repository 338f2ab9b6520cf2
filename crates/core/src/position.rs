//! Double calendar positions and their legs.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::history::History;

/// Days before the front expiration that mark the final adjustment date.
pub const FAD_OFFSET_DAYS: i64 = 14;

/// History/leg key of the original PUT calendar.
pub const PUT_LEG: &str = "PUT";
/// History/leg key of the original CALL calendar.
pub const CALL_LEG: &str = "CALL";

/// Option class of a calendar leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionClass {
    Put,
    Call,
}

impl OptionClass {
    /// Single-letter code used in instrument ids.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Put => 'P',
            Self::Call => 'C',
        }
    }
}

impl std::fmt::Display for OptionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Put => write!(f, "PUT"),
            Self::Call => write!(f, "CALL"),
        }
    }
}

impl std::str::FromStr for OptionClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p" | "put" => Ok(Self::Put),
            "c" | "call" => Ok(Self::Call),
            other => Err(format!("unknown option class '{other}' (expected put or call)")),
        }
    }
}

/// Edge-triggered profit alert state of one leg.
///
/// `Armed` fires once when the target is reached and moves to `Sent`;
/// `Sent` re-arms when P/L drops back below the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    #[default]
    Armed,
    Sent,
}

/// One put or call calendar spread: short front, long back, same strike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarLeg {
    /// Key unique within the position (`PUT`, `CALL`, `ADJ1`, ...).
    pub name: String,
    pub class: OptionClass,
    pub strike: Decimal,
    pub td_price_front: Decimal,
    pub td_price_back: Decimal,
    /// Profit target in percent; zero disables alerting.
    pub alert_target: Decimal,
    #[serde(default)]
    pub alert: AlertState,
}

impl CalendarLeg {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        class: OptionClass,
        strike: Decimal,
        td_price_front: Decimal,
        td_price_back: Decimal,
        alert_target: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            class,
            strike,
            td_price_front,
            td_price_back,
            alert_target,
            alert: AlertState::Armed,
        }
    }

    /// Human-readable name, e.g. `PUT` or `ADJ1 CALL`.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.name == PUT_LEG || self.name == CALL_LEG {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.class)
        }
    }

    #[must_use]
    pub fn alerts_enabled(&self) -> bool {
        self.alert_target > Decimal::ZERO
    }
}

/// A double calendar on one underlying, keyed by ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub front_expiration: NaiveDate,
    pub back_expiration: NaiveDate,
    pub final_adjustment_date: NaiveDate,
    pub put: CalendarLeg,
    pub call: CalendarLeg,
    #[serde(default)]
    pub adjustments: Vec<CalendarLeg>,
    #[serde(default)]
    pub history: History,
    /// Back-leg implied volatility (percent) observed on the first evaluation.
    #[serde(default)]
    pub td_back_vol: Option<Decimal>,
    /// Bumped by every management edit; cycle write-backs only land on a
    /// stored record with the same revision.
    #[serde(default)]
    pub revision: u64,
}

impl Position {
    #[must_use]
    pub fn new(
        ticker: &str,
        front_expiration: NaiveDate,
        back_expiration: NaiveDate,
        put: CalendarLeg,
        call: CalendarLeg,
    ) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            front_expiration,
            back_expiration,
            final_adjustment_date: final_adjustment_date(front_expiration),
            put,
            call,
            adjustments: Vec::new(),
            history: History::default(),
            td_back_vol: None,
            revision: 0,
        }
    }

    /// All legs in evaluation order: PUT, CALL, then adjustments.
    pub fn legs(&self) -> impl Iterator<Item = &CalendarLeg> {
        [&self.put, &self.call]
            .into_iter()
            .chain(self.adjustments.iter())
    }

    pub fn legs_mut(&mut self) -> impl Iterator<Item = &mut CalendarLeg> {
        [&mut self.put, &mut self.call]
            .into_iter()
            .chain(self.adjustments.iter_mut())
    }

    #[must_use]
    pub fn leg(&self, name: &str) -> Option<&CalendarLeg> {
        self.legs().find(|l| l.name == name)
    }

    /// Name for the next adjustment leg (`ADJ1`, `ADJ2`, ...).
    #[must_use]
    pub fn next_adjustment_name(&self) -> String {
        format!("ADJ{}", self.adjustments.len() + 1)
    }

    /// Days from `today` until the final adjustment date (negative once passed).
    #[must_use]
    pub fn days_to_fad(&self, today: NaiveDate) -> i64 {
        (self.final_adjustment_date - today).num_days()
    }
}

/// Front expiration minus [`FAD_OFFSET_DAYS`].
#[must_use]
pub fn final_adjustment_date(front_expiration: NaiveDate) -> NaiveDate {
    front_expiration - Duration::days(FAD_OFFSET_DAYS)
}
