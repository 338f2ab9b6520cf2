//! Position monitoring: quote every leg, value it, advance its alert, record history.

use calendar_core::symbol;
use calendar_core::{
    minute_label, AlertRequest, CalendarLeg, Notifier, Position, Quote, QuoteSource,
};
use chrono::{DateTime, NaiveDate, TimeZone};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::alerts::evaluate_alert;
use crate::types::{FadCountdown, LegSnapshot, PositionSnapshot};
use crate::valuation::{self, PlResult};

/// Quotes of one leg, zeroed where a fetch failed.
#[derive(Debug, Default)]
struct LegQuotes {
    front_symbol: Option<String>,
    back_symbol: Option<String>,
    front: Quote,
    back: Quote,
    degraded: bool,
}

async fn fetch_leg(
    quotes: &dyn QuoteSource,
    ticker: &str,
    front_expiration: NaiveDate,
    back_expiration: NaiveDate,
    leg: &CalendarLeg,
) -> LegQuotes {
    let symbols = symbol::encode(ticker, front_expiration, leg.strike, leg.class).and_then(|front| {
        symbol::encode(ticker, back_expiration, leg.strike, leg.class).map(|back| (front, back))
    });
    let (front_symbol, back_symbol) = match symbols {
        Ok(pair) => pair,
        Err(e) => {
            warn!(ticker, leg = %leg.name, error = %e, "Cannot build instrument ids, valuing leg at zero");
            return LegQuotes {
                degraded: true,
                ..LegQuotes::default()
            };
        }
    };

    let (front, back) = tokio::join!(quotes.quote(&front_symbol), quotes.quote(&back_symbol));

    let mut degraded = false;
    let mut settle = |symbol: &str, result: anyhow::Result<Quote>| match result {
        Ok(quote) => quote,
        Err(e) => {
            warn!(ticker, leg = %leg.name, symbol, error = %e, "Quote unavailable, using zero");
            degraded = true;
            Quote::default()
        }
    };
    let front = settle(&front_symbol, front);
    let back = settle(&back_symbol, back);

    LegQuotes {
        front_symbol: Some(front_symbol),
        back_symbol: Some(back_symbol),
        front,
        back,
        degraded,
    }
}

/// Mean of the present, non-zero back-leg IVs in percent, with the number of
/// IVs averaged. Zero when there are none.
fn mean_back_vol<'a>(ivs: impl Iterator<Item = &'a Quote>) -> (Decimal, usize) {
    let (sum, count) = ivs
        .filter_map(|q| q.implied_vol)
        .filter(|iv| *iv != 0.0)
        .filter_map(|iv| Decimal::try_from(iv).ok())
        .fold((Decimal::ZERO, 0usize), |(sum, n), iv| (sum.saturating_add(iv), n + 1));

    if count == 0 {
        return (Decimal::ZERO, 0);
    }
    let mean = sum
        .checked_div(Decimal::from(count))
        .unwrap_or(Decimal::ZERO)
        .saturating_mul(Decimal::ONE_HUNDRED);
    (mean.round_dp(2), count)
}

/// Evaluates one position at `now`, mutating its alert states and history.
///
/// Quote failures degrade only the affected leg. Alerts are committed before
/// delivery; delivery failures are logged and not retried.
pub async fn evaluate_position<Tz>(
    position: &mut Position,
    quotes: &dyn QuoteSource,
    notifier: &dyn Notifier,
    now: &DateTime<Tz>,
) -> PositionSnapshot
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut fetched = Vec::with_capacity(position.adjustments.len() + 2);
    for leg in position.legs() {
        fetched.push(
            fetch_leg(
                quotes,
                &position.ticker,
                position.front_expiration,
                position.back_expiration,
                leg,
            )
            .await,
        );
    }

    let label = minute_label(now);
    let Position {
        ticker,
        put,
        call,
        adjustments,
        history,
        final_adjustment_date,
        td_back_vol,
        ..
    } = position;

    let mut alerts: Vec<AlertRequest> = Vec::new();
    let mut valuations: Vec<PlResult> = Vec::with_capacity(fetched.len());
    let mut legs = Vec::with_capacity(fetched.len());

    let all_legs = [put, call].into_iter().chain(adjustments.iter_mut());
    for (leg, q) in all_legs.zip(fetched.iter()) {
        let now_front = q.front.last_or_zero();
        let now_back = q.back.last_or_zero();
        let pl = valuation::value(leg.td_price_back, leg.td_price_front, now_back, now_front);

        debug!(
            ticker = %ticker,
            leg = %leg.name,
            front = %now_front,
            back = %now_back,
            pl_pct = %pl.pl_percent,
            "Leg valued"
        );

        if let Some(alert) = evaluate_alert(leg, ticker, pl.pl_percent) {
            alerts.push(alert);
        }
        history.record_leg(&leg.name, &label, pl.pl_percent);
        valuations.push(pl);

        legs.push(LegSnapshot {
            name: leg.name.clone(),
            display_name: leg.display_name(),
            class: leg.class,
            strike: leg.strike,
            front_symbol: q.front_symbol.clone(),
            back_symbol: q.back_symbol.clone(),
            td_price_front: leg.td_price_front,
            td_price_back: leg.td_price_back,
            now_price_front: now_front,
            now_price_back: now_back,
            back_iv: q.back.implied_vol,
            valuation: pl,
            alert_target: leg.alert_target,
            alert: leg.alert,
            degraded: q.degraded,
            history: history
                .leg(&leg.name)
                .map(|s| s.values().collect())
                .unwrap_or_default(),
        });
    }

    let (back_vol, back_vol_sources) = mean_back_vol(fetched.iter().map(|q| &q.back));
    if back_vol_sources > 0 && back_vol_sources < fetched.len() {
        debug!(
            ticker = %ticker,
            sources = back_vol_sources,
            legs = fetched.len(),
            "Back volatility averages a subset of legs"
        );
    }
    history.record_back_vol(&label, back_vol);
    if td_back_vol.is_none() && !back_vol.is_zero() {
        debug!(ticker = %ticker, back_vol = %back_vol, "Recorded entry back volatility");
        *td_back_vol = Some(back_vol);
    }

    for alert in &alerts {
        if let Err(e) = notifier.notify(alert).await {
            warn!(
                ticker = %alert.ticker,
                leg = %alert.leg,
                error = %e,
                "Notification delivery failed"
            );
        }
    }

    PositionSnapshot {
        ticker: ticker.clone(),
        legs,
        total_pl_percent: valuation::aggregate(&valuations),
        back_vol,
        back_vol_sources,
        td_back_vol: *td_back_vol,
        back_vol_history: history.back_vol.values().collect(),
        fad: FadCountdown::new(*final_adjustment_date, now.date_naive()),
        alerts_fired: alerts.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use calendar_core::{OptionClass, CALL_LEG, PUT_LEG};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StaticQuotes(HashMap<String, Quote>);

    impl StaticQuotes {
        fn with(mut self, symbol: &str, last: Decimal, iv: Option<f64>) -> Self {
            self.0.insert(
                symbol.to_string(),
                Quote {
                    last_price: Some(last),
                    implied_vol: iv,
                },
            );
            self
        }
    }

    #[async_trait]
    impl QuoteSource for StaticQuotes {
        async fn quote(&self, symbol: &str) -> anyhow::Result<Quote> {
            self.0
                .get(symbol)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("no data for {symbol}"))
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<AlertRequest>>);

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(&self, alert: &AlertRequest) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn notify(&self, _alert: &AlertRequest) -> anyhow::Result<()> {
            anyhow::bail!("chat unreachable")
        }
    }

    fn position() -> Position {
        Position::new(
            "PETR4",
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            CalendarLeg::new(PUT_LEG, OptionClass::Put, dec!(35.5), dec!(2.00), dec!(5.00), dec!(20)),
            CalendarLeg::new(CALL_LEG, OptionClass::Call, dec!(38), dec!(1.00), dec!(2.00), dec!(0)),
        )
    }

    fn quotes() -> StaticQuotes {
        StaticQuotes::default()
            .with("PETR240315P00035500", dec!(1.50), Some(0.40))
            .with("PETR240419P00035500", dec!(6.00), Some(0.30))
            .with("PETR240315C00038000", dec!(1.00), None)
            .with("PETR240419C00038000", dec!(1.50), Some(0.50))
    }

    #[tokio::test]
    async fn values_legs_and_fires_alert() {
        let mut pos = position();
        let notifier = Recorder::default();
        let now = Utc.with_ymd_and_hms(2024, 2, 26, 14, 5, 0).unwrap();

        let snap = evaluate_position(&mut pos, &quotes(), &notifier, &now).await;

        assert_eq!(snap.legs[0].valuation.pl_percent, dec!(50));
        assert_eq!(snap.legs[1].valuation.pl_percent, dec!(-50));
        // (1.50 - 0.50) / (3.00 + 1.00)
        assert_eq!(snap.total_pl_percent, dec!(25));
        assert_eq!(snap.back_vol, dec!(40));
        assert!(!snap.back_vol_is_partial());
        assert_eq!(pos.td_back_vol, Some(dec!(40)));
        assert_eq!(snap.fad.days_left, 4);
        assert!(snap.fad.is_urgent());

        let sent = notifier.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].leg, "PUT");
        assert_eq!(snap.alerts_fired, 1);
    }

    #[tokio::test]
    async fn same_minute_records_once() {
        let mut pos = position();
        let notifier = Recorder::default();
        let t0 = Utc.with_ymd_and_hms(2024, 2, 26, 14, 5, 1).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 2, 26, 14, 5, 59).unwrap();

        evaluate_position(&mut pos, &quotes(), &notifier, &t0).await;
        evaluate_position(&mut pos, &quotes(), &notifier, &t1).await;

        assert_eq!(pos.history.leg(PUT_LEG).unwrap().len(), 1);
        assert_eq!(pos.history.back_vol.len(), 1);
        assert_eq!(notifier.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_quotes_degrade_only_that_leg() {
        let mut pos = position();
        let partial = StaticQuotes::default()
            .with("PETR240315P00035500", dec!(1.50), None)
            .with("PETR240419P00035500", dec!(6.00), None);
        let now = Utc.with_ymd_and_hms(2024, 2, 26, 14, 5, 0).unwrap();

        let snap = evaluate_position(&mut pos, &partial, &Failing, &now).await;

        assert!(!snap.legs[0].degraded);
        assert!(snap.legs[1].degraded);
        assert_eq!(snap.legs[1].now_price_back, Decimal::ZERO);
        assert_eq!(snap.legs[1].valuation.pl_percent, dec!(-100));
        assert_eq!(snap.back_vol, Decimal::ZERO);
        assert!(!snap.back_vol_is_partial());
        assert_eq!(pos.td_back_vol, None);
        // Delivery failed but the transition is kept.
        assert_eq!(pos.put.alert, calendar_core::AlertState::Sent);
    }

    #[tokio::test]
    async fn single_back_iv_is_flagged_partial() {
        let mut pos = position();
        let put_iv_only = StaticQuotes::default()
            .with("PETR240315P00035500", dec!(1.50), None)
            .with("PETR240419P00035500", dec!(6.00), Some(0.30))
            .with("PETR240315C00038000", dec!(1.00), None)
            .with("PETR240419C00038000", dec!(1.50), None);
        let now = Utc.with_ymd_and_hms(2024, 2, 26, 14, 5, 0).unwrap();

        let snap = evaluate_position(&mut pos, &put_iv_only, &Recorder::default(), &now).await;

        assert_eq!(snap.back_vol, dec!(30));
        assert_eq!(snap.back_vol_sources, 1);
        assert!(snap.back_vol_is_partial());
    }

    #[tokio::test]
    async fn extreme_entry_prices_do_not_stop_the_cycle() {
        let mut pos = position();
        pos.put.td_price_front = dec!(1);
        pos.put.td_price_back = dec!(1.0000000000000000000000000001);
        let notifier = Recorder::default();
        let now = Utc.with_ymd_and_hms(2024, 2, 26, 14, 5, 0).unwrap();

        let snap = evaluate_position(&mut pos, &quotes(), &notifier, &now).await;

        assert_eq!(snap.legs[0].valuation.pl_percent, Decimal::MAX);
        assert_eq!(snap.legs[1].valuation.pl_percent, dec!(-50));
        assert_eq!(notifier.0.lock().unwrap().len(), 1);
        assert_eq!(pos.history.leg(CALL_LEG).unwrap().len(), 1);
    }

    #[test]
    fn back_vol_ignores_missing_and_zero() {
        let qs = [
            Quote { last_price: None, implied_vol: Some(0.25) },
            Quote { last_price: None, implied_vol: Some(0.0) },
            Quote { last_price: None, implied_vol: None },
            Quote { last_price: None, implied_vol: Some(0.35) },
        ];
        assert_eq!(mean_back_vol(qs.iter()), (dec!(30), 2));
        assert_eq!(mean_back_vol(std::iter::empty()), (Decimal::ZERO, 0));
    }
}
