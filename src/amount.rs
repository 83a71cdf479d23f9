//! Fixed-point conversion between raw ledger balances and decimal amounts
//!
//! Raw balances are integers scaled by `10^exponent`. All arithmetic is done
//! on `BigUint`, so amounts above `f64` exactness convert without loss.

use core::fmt;

use num_bigint::BigUint;

use crate::error::CampaignError;
use crate::types::ChainMetadata;

/// Largest decimal exponent accepted for a token
pub const MAX_EXPONENT: u32 = 64;

/// Raw balance split at the decimal point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayAmount {
    pub integer: BigUint,
    pub fractional: BigUint,
    pub exponent: u32,
}

impl fmt::Display for DisplayAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.exponent as usize;
        let digits = format!("{:0>width$}", self.fractional.to_string(), width = width);
        let trimmed = digits.trim_end_matches('0');
        let fraction = if trimmed.is_empty() { "0" } else { trimmed };
        write!(f, "{}.{}", self.integer, fraction)
    }
}

/// Split `raw` into `(integer, fractional)` with `raw = integer * 10^exponent + fractional`
pub fn to_display(raw: &BigUint, exponent: i64) -> Result<DisplayAmount, CampaignError> {
    let exponent = checked_exponent(exponent)?;
    let base = scale(exponent);
    Ok(DisplayAmount {
        integer: raw / &base,
        fractional: raw % &base,
        exponent,
    })
}

/// Exact inverse of [`to_display`]
pub fn to_raw(
    integer: &BigUint,
    fractional: &BigUint,
    exponent: i64,
) -> Result<BigUint, CampaignError> {
    let exponent = checked_exponent(exponent)?;
    let base = scale(exponent);
    if fractional >= &base {
        return Err(CampaignError::FractionOutOfRange {
            fractional: fractional.to_string(),
            exponent,
        });
    }
    Ok(integer * &base + fractional)
}

/// Parse a decimal string such as `"10000.5"` into a raw balance
///
/// More fractional digits than `exponent` would lose precision and are rejected.
pub fn parse_amount(text: &str, exponent: i64) -> Result<BigUint, CampaignError> {
    let exponent = checked_exponent(exponent)?;
    let text = text.trim();
    let (integer, fraction) = match text.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (text, ""),
    };

    if integer.is_empty() && fraction.is_empty() {
        return Err(CampaignError::InvalidAmount(format!("'{}'", text)));
    }
    if !integer.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(CampaignError::InvalidAmount(format!(
            "'{}' is not a decimal number",
            text
        )));
    }
    if fraction.len() > exponent as usize {
        return Err(CampaignError::InvalidAmount(format!(
            "'{}' has more than {} fractional digits",
            text, exponent
        )));
    }

    let integer = parse_digits(integer)?;
    let padded = format!("{:0<width$}", fraction, width = exponent as usize);
    let fractional = parse_digits(&padded)?;
    to_raw(&integer, &fractional, exponent as i64)
}

/// Render a raw balance as `"<amount> <symbol>"`
pub fn format_balance(raw: &BigUint, metadata: &ChainMetadata) -> Result<String, CampaignError> {
    let display = to_display(raw, metadata.decimals as i64)?;
    Ok(format!("{} {}", display, metadata.token_symbol))
}

fn parse_digits(digits: &str) -> Result<BigUint, CampaignError> {
    if digits.is_empty() {
        return Ok(BigUint::from(0u32));
    }
    digits
        .parse::<BigUint>()
        .map_err(|e| CampaignError::InvalidAmount(format!("'{}': {}", digits, e)))
}

pub(crate) fn checked_exponent(exponent: i64) -> Result<u32, CampaignError> {
    u32::try_from(exponent)
        .ok()
        .filter(|exponent| *exponent <= MAX_EXPONENT)
        .ok_or(CampaignError::InvalidExponent(exponent))
}

fn scale(exponent: u32) -> BigUint {
    BigUint::from(10u32).pow(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn big(s: &str) -> BigUint {
        s.parse().unwrap()
    }

    #[test]
    fn test_to_display_campaign_amount() {
        let display = to_display(&big("10000000000"), 6).unwrap();
        assert_eq!(display.integer, big("10000"));
        assert_eq!(display.fractional, big("0"));
        assert_eq!(display.to_string(), "10000.0");
    }

    #[test]
    fn test_fraction_is_zero_padded() {
        let display = to_display(&big("10000000005"), 6).unwrap();
        assert_eq!(display.fractional, big("5"));
        assert_eq!(display.to_string(), "10000.000005");
    }

    #[test]
    fn test_negative_exponent_rejected() {
        assert_eq!(
            to_display(&big("1"), -1),
            Err(CampaignError::InvalidExponent(-1))
        );
        assert_eq!(
            to_raw(&big("1"), &big("0"), -3),
            Err(CampaignError::InvalidExponent(-3))
        );
    }

    #[rstest]
    #[case(65)]
    #[case(4_000_000_000)]
    #[case(i64::MAX)]
    fn test_oversized_exponent_rejected(#[case] exponent: i64) {
        assert_eq!(
            to_display(&big("1"), exponent),
            Err(CampaignError::InvalidExponent(exponent))
        );
        assert_eq!(
            parse_amount("1", exponent),
            Err(CampaignError::InvalidExponent(exponent))
        );
        assert!(to_display(&big("1"), MAX_EXPONENT as i64).is_ok());
    }

    #[rstest]
    #[case("0", 0)]
    #[case("0", 12)]
    #[case("999999", 6)]
    #[case("10000000000", 6)]
    #[case("340282366920938463463374607431768211455", 12)]
    #[case("123456789012345678901234567890123456789012345678901234567890", 18)]
    fn test_roundtrip(#[case] raw: &str, #[case] exponent: i64) {
        let raw = big(raw);
        let display = to_display(&raw, exponent).unwrap();
        assert_eq!(
            to_raw(&display.integer, &display.fractional, exponent).unwrap(),
            raw
        );
    }

    #[test]
    fn test_to_raw_rejects_oversized_fraction() {
        let err = to_raw(&big("1"), &big("1000000"), 6).unwrap_err();
        assert!(matches!(err, CampaignError::FractionOutOfRange { exponent: 6, .. }));
    }

    #[rstest]
    #[case("10000", 6, "10000000000")]
    #[case("10000.5", 6, "10000500000")]
    #[case("0.000001", 6, "1")]
    #[case(".25", 2, "25")]
    #[case("7.", 3, "7000")]
    fn test_parse_amount(#[case] text: &str, #[case] exponent: i64, #[case] expected: &str) {
        assert_eq!(parse_amount(text, exponent).unwrap(), big(expected));
    }

    #[rstest]
    #[case("1.0000001", 6)]
    #[case("1,5", 6)]
    #[case("-1", 6)]
    #[case(".", 6)]
    fn test_parse_amount_rejects(#[case] text: &str, #[case] exponent: i64) {
        assert!(matches!(
            parse_amount(text, exponent),
            Err(CampaignError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_format_balance_with_symbol() {
        let metadata = ChainMetadata {
            token_symbol: "UNIT".to_string(),
            decimals: 12,
        };
        assert_eq!(
            format_balance(&big("1500000000000"), &metadata).unwrap(),
            "1.5 UNIT"
        );
    }

    proptest! {
        #[test]
        fn test_display_roundtrip_any_raw(digits in "[0-9]{1,80}", exponent in 0i64..=40) {
            let raw = big(&digits);
            let display = to_display(&raw, exponent).unwrap();
            prop_assert!(display.fractional < scale(exponent as u32));
            prop_assert_eq!(
                to_raw(&display.integer, &display.fractional, exponent).unwrap(),
                raw
            );
        }

        #[test]
        fn test_rendered_amount_parses_back(digits in "[0-9]{1,40}", exponent in 1i64..=18) {
            let raw = big(&digits);
            let text = to_display(&raw, exponent).unwrap().to_string();
            prop_assert_eq!(parse_amount(&text, exponent).unwrap(), raw);
        }
    }
}
