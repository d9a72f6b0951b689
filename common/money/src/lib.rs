use bigdecimal::{BigDecimal, ToPrimitive};
use std::str::FromStr;
use thiserror::Error;

/// Minor units per major unit for every currency the gateway accepts (COP, USD).
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Largest accepted decimal exponent, either way. Anything wider cannot be a
/// real price and would make the conversion arithmetic arbitrarily expensive.
pub const MAX_SCALE: i64 = 18;
/// Upper bound on the unscaled integer, in bits (about 38 decimal digits).
pub const MAX_UNSCALED_BITS: u64 = 128;
/// Upper bound on the textual form handed to [`parse_amount`].
pub const MAX_AMOUNT_TEXT_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount {0} does not fit in 64-bit minor units")]
    Overflow(String),
    #[error("amount '{0}' is not a decimal number")]
    Unparseable(String),
    #[error("amount has too many digits or too large an exponent")]
    OutOfRange,
}

/// Parse a decimal amount and reject anything outside [`check_bounds`]. The
/// text length is capped before parsing.
pub fn parse_amount(text: &str) -> Result<BigDecimal, MoneyError> {
    let text = text.trim();
    if text.len() > MAX_AMOUNT_TEXT_LEN {
        return Err(MoneyError::OutOfRange);
    }
    let value = BigDecimal::from_str(text).map_err(|_| MoneyError::Unparseable(text.to_string()))?;
    check_bounds(&value)?;
    Ok(value)
}

/// Cheap shape check: looks only at the exponent and the size of the unscaled
/// integer, never at the expanded value.
pub fn check_bounds(value: &BigDecimal) -> Result<(), MoneyError> {
    let (unscaled, scale) = value.as_bigint_and_exponent();
    if !(-MAX_SCALE..=MAX_SCALE).contains(&scale) || unscaled.bits() > MAX_UNSCALED_BITS {
        return Err(MoneyError::OutOfRange);
    }
    Ok(())
}

/// Convert a major-unit amount into integer minor units, rounding half up
/// (exact midpoints move away from zero, so `100.005` becomes `10001`).
pub fn to_minor_units(value: &BigDecimal) -> Result<i64, MoneyError> {
    check_bounds(value)?;
    let scaled = value * BigDecimal::from(MINOR_UNITS_PER_MAJOR);
    round_half_up(&scaled)
        .to_i64()
        .ok_or_else(|| MoneyError::Overflow(value.to_string()))
}

/// Like [`to_minor_units`] but rejects zero and negative amounts, including
/// positive amounts that round down to zero cents.
pub fn positive_minor_units(value: &BigDecimal) -> Result<i64, MoneyError> {
    check_bounds(value)?;
    if *value <= BigDecimal::from(0) {
        return Err(MoneyError::NotPositive);
    }
    match to_minor_units(value)? {
        0 => Err(MoneyError::NotPositive),
        cents => Ok(cents),
    }
}

fn round_half_up(value: &BigDecimal) -> BigDecimal {
    // with_scale(0) truncates toward zero
    let truncated = value.with_scale(0);
    let doubled = (value - &truncated).abs() * BigDecimal::from(2);
    if doubled < BigDecimal::from(1) {
        return truncated;
    }
    if *value < BigDecimal::from(0) {
        truncated - BigDecimal::from(1)
    } else {
        truncated + BigDecimal::from(1)
    }
}
