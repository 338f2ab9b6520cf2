//! Calendar spread P/L: debit paid at entry vs. spread value now.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Valuation of one calendar leg.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlResult {
    /// Debit paid at entry: back minus front.
    pub initial_cost: Decimal,
    /// Spread value now: back minus front.
    pub current_value: Decimal,
    pub absolute_pl: Decimal,
    /// Zero when `initial_cost` is zero.
    pub pl_percent: Decimal,
}

/// Values one calendar from entry and current prices of both options.
///
/// Never panics: a result beyond the `Decimal` range saturates at
/// `Decimal::MAX` or `Decimal::MIN` with the sign of the true value.
#[must_use]
pub fn value(td_back: Decimal, td_front: Decimal, now_back: Decimal, now_front: Decimal) -> PlResult {
    let initial_cost = td_back.saturating_sub(td_front);
    let current_value = now_back.saturating_sub(now_front);
    let absolute_pl = current_value.saturating_sub(initial_cost);

    PlResult {
        initial_cost,
        current_value,
        absolute_pl,
        pl_percent: percent_of(absolute_pl, initial_cost.abs()),
    }
}

/// Position-level P/L percent: summed P/L over summed absolute cost.
#[must_use]
pub fn aggregate(results: &[PlResult]) -> Decimal {
    let (pl, cost) = results.iter().fold((Decimal::ZERO, Decimal::ZERO), |(pl, cost), r| {
        (
            pl.saturating_add(r.absolute_pl),
            cost.saturating_add(r.initial_cost.abs()),
        )
    });
    percent_of(pl, cost)
}

fn percent_of(amount: Decimal, base: Decimal) -> Decimal {
    if base.is_zero() {
        return Decimal::ZERO;
    }
    let ratio = amount.checked_div(base).unwrap_or_else(|| saturated(amount, base));
    ratio.saturating_mul(Decimal::ONE_HUNDRED)
}

fn saturated(amount: Decimal, base: Decimal) -> Decimal {
    if amount.is_sign_negative() == base.is_sign_negative() {
        Decimal::MAX
    } else {
        Decimal::MIN
    }
}
