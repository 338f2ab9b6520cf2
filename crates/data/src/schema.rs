//! Versioned position records and migration of the legacy layout.
//!
//! Current records are the serialized [`Position`] plus a `schema_version`
//! field. Records without `schema_version` use the legacy layout: fixed
//! `put_calendar`/`call_calendar` maps, flat history arrays indexed by a
//! shared `timestamp` array, and untyped `adjustments` maps. They are migrated
//! here, once, on load; the next save writes them back in the current layout.

use calendar_core::history::{HistoryPoint, Series};
use calendar_core::position::{final_adjustment_date, CALL_LEG, PUT_LEG};
use calendar_core::{AlertState, CalendarLeg, History, OptionClass, Position};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::StoreError;

/// Layout version written by this build.
pub const CURRENT_SCHEMA_VERSION: u64 = 2;

/// Field carrying the layout version inside each record.
pub const VERSION_FIELD: &str = "schema_version";

const LEGACY_SCHEMA_VERSION: u64 = 1;

/// Field carrying the position's edit revision inside each record.
const REVISION_FIELD: &str = "revision";

/// Serializes a position as a current-version record.
///
/// # Errors
/// Returns an error if the position cannot be serialized.
pub fn encode_record(position: &Position) -> Result<Value, StoreError> {
    let mut value = serde_json::to_value(position)?;
    if let Value::Object(map) = &mut value {
        map.insert(VERSION_FIELD.to_string(), Value::from(CURRENT_SCHEMA_VERSION));
    }
    Ok(value)
}

/// Version of a stored record; records without the field are legacy (1).
#[must_use]
pub fn record_version(value: &Value) -> u64 {
    value
        .get(VERSION_FIELD)
        .and_then(Value::as_u64)
        .unwrap_or(LEGACY_SCHEMA_VERSION)
}

/// Edit revision of a stored record; records without the field are at 0.
#[must_use]
pub fn record_revision(value: &Value) -> u64 {
    value
        .get(REVISION_FIELD)
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Decodes a stored record of any supported version into a [`Position`].
///
/// `ticker` is the record's key; it wins over any ticker inside the record.
///
/// # Errors
/// Returns an error for unknown versions or records that do not match their layout.
pub fn decode_record(ticker: &str, value: Value) -> Result<Position, StoreError> {
    match record_version(&value) {
        CURRENT_SCHEMA_VERSION => {
            let mut position: Position = serde_json::from_value(value)
                .map_err(|e| StoreError::schema(ticker, e.to_string()))?;
            position.ticker = ticker.to_string();
            Ok(position)
        }
        LEGACY_SCHEMA_VERSION => {
            let legacy: LegacyPosition = serde_json::from_value(value)
                .map_err(|e| StoreError::schema(ticker, e.to_string()))?;
            legacy.migrate(ticker)
        }
        version => Err(StoreError::UnsupportedVersion {
            ticker: ticker.to_string(),
            version,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct LegacyCalendar {
    strike: Decimal,
    td_price_front: Decimal,
    td_price_back: Decimal,
    #[serde(default)]
    alert_target: Decimal,
    #[serde(default)]
    alert_sent: bool,
}

#[derive(Debug, Deserialize)]
struct LegacyAdjustment {
    #[serde(alias = "type", alias = "class")]
    option_type: String,
    strike: Decimal,
    td_price_front: Decimal,
    td_price_back: Decimal,
    #[serde(default)]
    alert_target: Decimal,
    #[serde(default)]
    alert_sent: bool,
}

#[derive(Debug, Deserialize)]
struct LegacyExpirations {
    front: String,
    back: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyHistory {
    timestamp: Vec<String>,
    put_z: Vec<Decimal>,
    call_z: Vec<Decimal>,
    back_vol: Vec<Decimal>,
}

#[derive(Debug, Deserialize)]
struct LegacyPosition {
    put_calendar: LegacyCalendar,
    call_calendar: LegacyCalendar,
    expirations: LegacyExpirations,
    #[serde(default)]
    fad_date: Option<String>,
    #[serde(default)]
    history: LegacyHistory,
    #[serde(default)]
    adjustments: Vec<LegacyAdjustment>,
    #[serde(default)]
    td_back_vol: Option<Decimal>,
}

fn alert_state(sent: bool) -> AlertState {
    if sent {
        AlertState::Sent
    } else {
        AlertState::Armed
    }
}

fn parse_date(ticker: &str, field: &str, raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| StoreError::schema(ticker, format!("{field} '{raw}': {e}")))
}

/// Pairs labels with values; the shorter array bounds the series.
fn zip_series(labels: &[String], values: Vec<Decimal>) -> Series {
    labels
        .iter()
        .zip(values)
        .map(|(label, value)| HistoryPoint {
            label: label.clone(),
            value,
        })
        .collect::<Vec<_>>()
        .into()
}

impl LegacyCalendar {
    fn into_leg(self, name: &str, class: OptionClass) -> CalendarLeg {
        CalendarLeg {
            alert: alert_state(self.alert_sent),
            ..CalendarLeg::new(
                name,
                class,
                self.strike,
                self.td_price_front,
                self.td_price_back,
                self.alert_target,
            )
        }
    }
}

impl LegacyPosition {
    fn migrate(self, ticker: &str) -> Result<Position, StoreError> {
        let front = parse_date(ticker, "expirations.front", &self.expirations.front)?;
        let back = parse_date(ticker, "expirations.back", &self.expirations.back)?;
        let fad = match &self.fad_date {
            Some(raw) => parse_date(ticker, "fad_date", raw)?,
            None => final_adjustment_date(front),
        };

        let mut adjustments = Vec::with_capacity(self.adjustments.len());
        for (i, adj) in self.adjustments.into_iter().enumerate() {
            let class: OptionClass = adj
                .option_type
                .parse()
                .map_err(|e: String| StoreError::schema(ticker, format!("adjustment {}: {e}", i + 1)))?;
            adjustments.push(CalendarLeg {
                alert: alert_state(adj.alert_sent),
                ..CalendarLeg::new(
                    format!("ADJ{}", i + 1),
                    class,
                    adj.strike,
                    adj.td_price_front,
                    adj.td_price_back,
                    adj.alert_target,
                )
            });
        }

        let LegacyHistory {
            timestamp,
            put_z,
            call_z,
            back_vol,
        } = self.history;

        let mut history = History::default();
        history
            .legs
            .insert(PUT_LEG.to_string(), zip_series(&timestamp, put_z));
        history
            .legs
            .insert(CALL_LEG.to_string(), zip_series(&timestamp, call_z));
        history.back_vol = zip_series(&timestamp, back_vol);

        Ok(Position {
            ticker: ticker.to_string(),
            front_expiration: front,
            back_expiration: back,
            final_adjustment_date: fad,
            put: self.put_calendar.into_leg(PUT_LEG, OptionClass::Put),
            call: self.call_calendar.into_leg(CALL_LEG, OptionClass::Call),
            adjustments,
            history,
            td_back_vol: self.td_back_vol,
            revision: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn legacy_record() -> Value {
        json!({
            "put_calendar": {"strike": 35.5, "td_price_front": 1.2, "td_price_back": 2.1,
                             "alert_target": 20.0, "alert_sent": true},
            "call_calendar": {"strike": 38.0, "td_price_front": 0.9, "td_price_back": 1.7,
                              "alert_target": 0.0, "alert_sent": false},
            "expirations": {"front": "2024-03-15", "back": "2024-04-19"},
            "fad_date": "2024-03-01",
            "history": {"timestamp": ["10:00", "10:05"], "put_z": [1.5, 2.5],
                        "call_z": [-3.0, -1.0], "back_vol": [41.2, 40.8]},
            "adjustments": [
                {"type": "call", "strike": 40.0, "td_price_front": 0.5, "td_price_back": 1.0}
            ],
            "td_back_vol": 41.2
        })
    }

    #[test]
    fn migrates_legacy_record() {
        let position = decode_record("PETR4", legacy_record()).unwrap();

        assert_eq!(position.ticker, "PETR4");
        assert_eq!(position.put.strike, dec!(35.5));
        assert_eq!(position.put.alert, AlertState::Sent);
        assert_eq!(position.call.alert, AlertState::Armed);
        assert_eq!(
            position.final_adjustment_date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );

        let put: Vec<_> = position.history.leg("PUT").unwrap().values().collect();
        assert_eq!(put, vec![dec!(1.5), dec!(2.5)]);
        assert_eq!(position.history.leg("CALL").unwrap().points()[1].label, "10:05");
        assert_eq!(position.history.back_vol.len(), 2);

        assert_eq!(position.adjustments.len(), 1);
        assert_eq!(position.adjustments[0].name, "ADJ1");
        assert_eq!(position.adjustments[0].class, OptionClass::Call);
        assert_eq!(position.adjustments[0].alert_target, Decimal::ZERO);
        assert_eq!(position.td_back_vol, Some(dec!(41.2)));
    }

    #[test]
    fn legacy_without_fad_derives_it() {
        let mut record = legacy_record();
        record.as_object_mut().unwrap().remove("fad_date");
        let position = decode_record("PETR4", record).unwrap();
        assert_eq!(
            position.final_adjustment_date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn current_record_roundtrips() {
        let position = decode_record("PETR4", legacy_record()).unwrap();
        let encoded = encode_record(&position).unwrap();
        assert_eq!(record_version(&encoded), CURRENT_SCHEMA_VERSION);

        let decoded = decode_record("PETR4", encoded).unwrap();
        assert_eq!(decoded, position);
    }

    #[test]
    fn future_version_is_rejected() {
        let record = json!({"schema_version": 9});
        assert!(matches!(
            decode_record("X", record),
            Err(StoreError::UnsupportedVersion { version: 9, .. })
        ));
    }

    #[test]
    fn bad_legacy_date_is_a_schema_error() {
        let mut record = legacy_record();
        record["expirations"]["front"] = json!("15/03/2024");
        assert!(matches!(
            decode_record("PETR4", record),
            Err(StoreError::Schema { .. })
        ));
    }

    #[test]
    fn bad_adjustment_class_is_a_schema_error() {
        let mut record = legacy_record();
        record["adjustments"][0]["type"] = json!("strangle");
        assert!(matches!(
            decode_record("PETR4", record),
            Err(StoreError::Schema { .. })
        ));
    }
}
