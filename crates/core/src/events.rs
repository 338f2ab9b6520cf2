use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::position::OptionClass;

/// Normalized option quote. Either field may be missing upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub last_price: Option<Decimal>,
    pub implied_vol: Option<f64>,
}

impl Quote {
    /// Last price, valued as zero when absent.
    #[must_use]
    pub fn last_or_zero(&self) -> Decimal {
        self.last_price.unwrap_or(Decimal::ZERO)
    }
}

/// A profit target crossing, emitted once per arm/fire cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub ticker: String,
    pub leg: String,
    pub class: OptionClass,
    pub strike: Decimal,
    pub pl_percent: Decimal,
    pub target: Decimal,
}

impl AlertRequest {
    /// Markdown message for chat delivery.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        format!(
            "🎯 *PROFIT ALERT ({leg})* 🎯\n\n*Ticker:* `{ticker}`\n*Calendar:* {class} Strike {strike:.2}\n*Current P/L:* `{pl:.2}%`\n*Target:* `{target:.2}%`",
            leg = self.leg,
            ticker = self.ticker,
            class = self.class,
            strike = self.strike,
            pl = self.pl_percent,
            target = self.target,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn markdown_message_carries_all_fields() {
        let alert = AlertRequest {
            ticker: "PETR4".to_string(),
            leg: "PUT".to_string(),
            class: OptionClass::Put,
            strike: dec!(35.5),
            pl_percent: dec!(25.123),
            target: dec!(20),
        };
        let msg = alert.to_markdown();
        assert!(msg.contains("*PROFIT ALERT (PUT)*"));
        assert!(msg.contains("`PETR4`"));
        assert!(msg.contains("PUT Strike 35.50"));
        assert!(msg.contains("`25.12%`"));
        assert!(msg.contains("`20.00%`"));
    }

    #[test]
    fn missing_last_price_values_as_zero() {
        assert_eq!(Quote::default().last_or_zero(), Decimal::ZERO);
    }
}
