//! Profit target alerts: one notification per crossing, re-armed on retreat.

use calendar_core::{AlertRequest, AlertState, CalendarLeg};
use rust_decimal::Decimal;

/// Advances the leg's alert state for the latest P/L.
///
/// Returns a request when an armed leg reaches its target. The state change is
/// applied immediately, whether or not the request is later delivered.
pub fn evaluate_alert(
    leg: &mut CalendarLeg,
    ticker: &str,
    pl_percent: Decimal,
) -> Option<AlertRequest> {
    if !leg.alerts_enabled() {
        return None;
    }

    let reached = pl_percent >= leg.alert_target;
    match (leg.alert, reached) {
        (AlertState::Armed, true) => {
            tracing::info!(
                ticker,
                leg = %leg.name,
                pl_pct = %pl_percent,
                target = %leg.alert_target,
                "Profit target reached"
            );
            leg.alert = AlertState::Sent;
            Some(AlertRequest {
                ticker: ticker.to_string(),
                leg: leg.display_name(),
                class: leg.class,
                strike: leg.strike,
                pl_percent,
                target: leg.alert_target,
            })
        }
        (AlertState::Sent, false) => {
            tracing::debug!(ticker, leg = %leg.name, pl_pct = %pl_percent, "Alert re-armed");
            leg.alert = AlertState::Armed;
            None
        }
        _ => None,
    }
}
