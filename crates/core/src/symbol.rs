//! Option instrument identifiers.
//!
//! Builds the OCC-style id the quote API expects:
//! `BASE + YYMMDD + P|C + strike*1000 (8 digits)`, e.g. `PETR240315P00035500`.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::position::OptionClass;

/// Largest strike*1000 value that fits the 8-digit field.
const MAX_STRIKE_MILLIS: u64 = 99_999_999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("ticker '{0}' has no base symbol")]
    EmptyTicker(String),

    #[error("invalid expiration date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("strike {0} cannot be encoded in 8 digits")]
    StrikeOutOfRange(Decimal),
}

/// Base symbol of an underlying: trailing share-class digits removed, uppercased.
///
/// `PETR4` → `PETR`, `aapl` → `AAPL`.
#[must_use]
pub fn base_ticker(ticker: &str) -> String {
    ticker
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .to_uppercase()
}

/// Encodes one option instrument id.
///
/// # Errors
/// Returns an error if the ticker has no base symbol or the strike is negative
/// or too large for the 8-digit strike field.
pub fn encode(
    ticker: &str,
    expiration: NaiveDate,
    strike: Decimal,
    class: OptionClass,
) -> Result<String, SymbolError> {
    let base = base_ticker(ticker);
    if base.is_empty() {
        return Err(SymbolError::EmptyTicker(ticker.to_string()));
    }

    let millis = strike
        .checked_mul(Decimal::from(1000))
        .and_then(|scaled| scaled.trunc().to_u64())
        .filter(|m| *m <= MAX_STRIKE_MILLIS)
        .ok_or(SymbolError::StrikeOutOfRange(strike))?;

    Ok(format!(
        "{base}{}{}{millis:08}",
        expiration.format("%y%m%d"),
        class.code()
    ))
}

/// Parses an expiration in `YYYY-MM-DD` form.
///
/// # Errors
/// Returns an error if the string is not a valid calendar date.
pub fn parse_expiration(raw: &str) -> Result<NaiveDate, SymbolError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| SymbolError::InvalidDate(raw.to_string()))
}

/// Convenience wrapper taking the expiration as a `YYYY-MM-DD` string.
///
/// # Errors
/// Returns an error on a malformed date or an unencodable strike.
pub fn encode_str(
    ticker: &str,
    expiration: &str,
    strike: Decimal,
    class: OptionClass,
) -> Result<String, SymbolError> {
    encode(ticker, parse_expiration(expiration)?, strike, class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn encodes_numbered_share_class() {
        let symbol = encode_str("PETR4", "2024-03-15", dec!(35.50), OptionClass::Put).unwrap();
        assert_eq!(symbol, "PETR240315P00035500");
    }

    #[test]
    fn encodes_call_with_lowercase_ticker() {
        let expiry = NaiveDate::from_ymd_opt(2026, 1, 16).unwrap();
        let symbol = encode("aapl", expiry, dec!(150), OptionClass::Call).unwrap();
        assert_eq!(symbol, "AAPL260116C00150000");
    }

    #[test]
    fn strike_resolution_is_thousandths() {
        let expiry = NaiveDate::from_ymd_opt(2024, 12, 20).unwrap();
        let symbol = encode("SPY", expiry, dec!(512.1259), OptionClass::Put).unwrap();
        assert!(symbol.ends_with("P00512125"));
    }

    #[test]
    fn only_trailing_digits_are_stripped() {
        assert_eq!(base_ticker("BRK2B11"), "BRK2B");
        assert_eq!(base_ticker(" vale3 "), "VALE");
    }

    #[test]
    fn rejects_malformed_date() {
        let err = encode_str("PETR4", "15/03/2024", dec!(35), OptionClass::Put).unwrap_err();
        assert_eq!(err, SymbolError::InvalidDate("15/03/2024".to_string()));
    }

    #[test]
    fn rejects_unencodable_strikes() {
        let expiry = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert!(matches!(
            encode("PETR4", expiry, dec!(-1), OptionClass::Put),
            Err(SymbolError::StrikeOutOfRange(_))
        ));
        assert!(matches!(
            encode("PETR4", expiry, dec!(100000), OptionClass::Put),
            Err(SymbolError::StrikeOutOfRange(_))
        ));
    }

    #[test]
    fn strike_too_large_to_scale_is_out_of_range() {
        let expiry = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(
            encode("PETR4", expiry, Decimal::MAX, OptionClass::Put),
            Err(SymbolError::StrikeOutOfRange(Decimal::MAX))
        );
    }

    #[test]
    fn rejects_all_digit_ticker() {
        let expiry = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert!(matches!(
            encode("1234", expiry, dec!(10), OptionClass::Call),
            Err(SymbolError::EmptyTicker(_))
        ));
    }
}
