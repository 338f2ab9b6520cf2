//! Market data API response models.

use calendar_core::Quote;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Status value of a response that carries data.
pub const STATUS_OK: &str = "ok";

/// Body of `GET options/quotes/{symbol}/`.
///
/// Every field is an array with one element per requested contract; this
/// client always requests a single contract.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotesResponse {
    /// `"ok"`, `"no_data"` or `"error"`.
    #[serde(rename = "s")]
    pub status: String,
    #[serde(default)]
    pub last: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub iv: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub errmsg: Option<String>,
}

impl QuotesResponse {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// First element of each series; missing or non-finite values become `None`.
    #[must_use]
    pub fn to_quote(&self) -> Quote {
        Quote {
            last_price: first(&self.last).and_then(|v| Decimal::try_from(v).ok()),
            implied_vol: first(&self.iv),
        }
    }
}

fn first(series: &Option<Vec<Option<f64>>>) -> Option<f64> {
    series
        .as_ref()
        .and_then(|s| s.first().copied().flatten())
        .filter(|v| v.is_finite())
}
