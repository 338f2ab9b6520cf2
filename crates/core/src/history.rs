//! Per-position metric history sampled at most once per wall-clock minute.

use chrono::{DateTime, TimeZone};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label format used as the sampling key.
pub const LABEL_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub label: String,
    pub value: Decimal,
}

/// An append-only series deduplicated on its last label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series(Vec<HistoryPoint>);

impl Series {
    /// Appends `value` unless the last point already carries `label`.
    ///
    /// Returns whether a point was appended.
    pub fn record(&mut self, label: &str, value: Decimal) -> bool {
        if self.0.last().is_some_and(|p| p.label == label) {
            return false;
        }
        self.0.push(HistoryPoint {
            label: label.to_string(),
            value,
        });
        true
    }

    #[must_use]
    pub fn points(&self) -> &[HistoryPoint] {
        &self.0
    }

    pub fn values(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.0.iter().map(|p| p.value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&HistoryPoint> {
        self.0.last()
    }
}

impl From<Vec<HistoryPoint>> for Series {
    fn from(points: Vec<HistoryPoint>) -> Self {
        Self(points)
    }
}

/// One P/L series per leg plus the shared back-leg volatility series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub legs: BTreeMap<String, Series>,
    #[serde(default)]
    pub back_vol: Series,
}

impl History {
    pub fn record_leg(&mut self, leg: &str, label: &str, pl_percent: Decimal) -> bool {
        self.legs
            .entry(leg.to_string())
            .or_default()
            .record(label, pl_percent)
    }

    pub fn record_back_vol(&mut self, label: &str, vol: Decimal) -> bool {
        self.back_vol.record(label, vol)
    }

    #[must_use]
    pub fn leg(&self, leg: &str) -> Option<&Series> {
        self.legs.get(leg)
    }
}

/// Sampling label (`HH:MM`) for an instant.
#[must_use]
pub fn minute_label<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(LABEL_FORMAT).to_string()
}
