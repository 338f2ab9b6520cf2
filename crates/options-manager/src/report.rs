#![allow(clippy::format_push_string)]

use chrono::{DateTime, TimeZone};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::types::{LegSnapshot, PositionSnapshot};

const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Most recent points drawn per sparkline.
pub const SPARK_WIDTH: usize = 30;

const RULE_HEAVY: &str = "═══════════════════════════════════════════════════════════════\n";
const RULE_LIGHT: &str = "───────────────────────────────────────────────────────────────\n";

/// Renders the most recent [`SPARK_WIDTH`] values as block characters.
#[must_use]
pub fn sparkline(values: &[Decimal]) -> String {
    let tail = &values[values.len().saturating_sub(SPARK_WIDTH)..];
    let floats: Vec<f64> = tail.iter().filter_map(ToPrimitive::to_f64).collect();
    let (Some(min), Some(max)) = (
        floats.iter().copied().reduce(f64::min),
        floats.iter().copied().reduce(f64::max),
    ) else {
        return String::new();
    };

    let span = max - min;
    floats
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                return SPARK_CHARS[SPARK_CHARS.len() / 2];
            }
            let idx = ((v - min) / span * (SPARK_CHARS.len() - 1) as f64).round() as usize;
            SPARK_CHARS[idx.min(SPARK_CHARS.len() - 1)]
        })
        .collect()
}

pub struct ReportFormatter;

impl ReportFormatter {
    /// Plain-text dashboard for one monitoring cycle.
    #[must_use]
    pub fn format<Tz>(snapshots: &[PositionSnapshot], at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let mut output = String::new();

        output.push('\n');
        output.push_str(RULE_HEAVY);
        output.push_str("                 DOUBLE CALENDAR MONITOR                       \n");
        output.push_str(RULE_HEAVY);

        if snapshots.is_empty() {
            output.push_str("\nNo positions registered.\n");
        }

        for snap in snapshots {
            Self::format_position(&mut output, snap);
        }

        output.push('\n');
        output.push_str(RULE_HEAVY);
        output.push_str(&format!("Last update: {}\n", at.format("%H:%M:%S")));
        output
    }

    fn format_position(output: &mut String, snap: &PositionSnapshot) {
        output.push('\n');
        output.push_str(&format!("{}\n", snap.ticker));
        output.push_str(RULE_LIGHT);

        for leg in &snap.legs {
            Self::format_leg(output, leg);
        }

        let td_vol = snap
            .td_back_vol
            .map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}%"));
        let partial = if snap.back_vol_is_partial() {
            format!(" [{}/{} legs]", snap.back_vol_sources, snap.legs.len())
        } else {
            String::new()
        };
        output.push_str(&format!(
            "Back Vol:              {:.2}%{} (entry {})  {}\n",
            snap.back_vol,
            partial,
            td_vol,
            sparkline(&snap.back_vol_history)
        ));
        output.push_str(&format!(
            "Total P/L:             {:+.2}%\n",
            snap.total_pl_percent
        ));

        let marker = if snap.fad.is_urgent() { "  ⚠️" } else { "" };
        output.push_str(&format!(
            "FAD:                   {} ({} days){}\n",
            snap.fad.date.format("%Y-%m-%d"),
            snap.fad.days_left,
            marker
        ));
    }

    fn format_leg(output: &mut String, leg: &LegSnapshot) {
        let target = if leg.alert_target > Decimal::ZERO {
            format!("{:.2}%", leg.alert_target)
        } else {
            "off".to_string()
        };
        let flag = if leg.degraded { " (no quote)" } else { "" };

        output.push_str(&format!(
            "{:<10} K {:>8.2}  front {:.2}/{:.2}  back {:.2}/{:.2}  P/L {:+.2}%  target {}{}\n",
            leg.display_name,
            leg.strike,
            leg.now_price_front,
            leg.td_price_front,
            leg.now_price_back,
            leg.td_price_back,
            leg.valuation.pl_percent,
            target,
            flag
        ));
        if !leg.history.is_empty() {
            output.push_str(&format!("           {}\n", sparkline(&leg.history)));
        }
    }
}
