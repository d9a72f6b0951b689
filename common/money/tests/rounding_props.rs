use bigdecimal::BigDecimal;
use common_money::{parse_amount, to_minor_units, MoneyError, MAX_SCALE};
use proptest::prelude::*;
use std::str::FromStr;

fn build(whole: i64, cents: i64, thousandth: i64) -> BigDecimal {
    BigDecimal::from_str(&format!("{}.{:02}{}", whole, cents, thousandth)).unwrap()
}

proptest! {
    // Two-decimal inputs never need rounding, so conversion is exact.
    #[test]
    fn exact_cents_are_preserved(whole in 0i64..10_000_000, cents in 0i64..100) {
        let value = BigDecimal::from_str(&format!("{}.{:02}", whole, cents)).unwrap();
        prop_assert_eq!(to_minor_units(&value).unwrap(), whole * 100 + cents);
    }

    // Third decimal 5 is an exact midpoint: half-up always moves to the next cent.
    #[test]
    fn half_up_midpoint_moves_up(whole in 0i64..1_000_000, cents in 0i64..100) {
        let value = build(whole, cents, 5);
        prop_assert_eq!(to_minor_units(&value).unwrap(), whole * 100 + cents + 1);
    }

    #[test]
    fn off_midpoint_rounds_to_nearest(whole in 0i64..1_000_000, cents in 0i64..100, thousandth in 0i64..10) {
        prop_assume!(thousandth != 5);
        let value = build(whole, cents, thousandth);
        let base = whole * 100 + cents;
        let expected = if thousandth > 5 { base + 1 } else { base };
        prop_assert_eq!(to_minor_units(&value).unwrap(), expected);
    }

    // Negation is symmetric under half-up.
    #[test]
    fn half_up_is_symmetric(whole in 0i64..1_000_000, cents in 0i64..100, thousandth in 0i64..10) {
        let value = build(whole, cents, thousandth);
        let negated = BigDecimal::from(0) - &value;
        prop_assert_eq!(to_minor_units(&negated).unwrap(), -to_minor_units(&value).unwrap());
    }

    // Exponents past the accepted scale fail fast whatever their size.
    #[test]
    fn wide_exponents_are_out_of_range(mantissa in 1u32..1000, exponent in (MAX_SCALE + 2)..100_000_000i64, negative in any::<bool>()) {
        let sign = if negative { "-" } else { "" };
        let text = format!("{}e{}{}", mantissa, sign, exponent);
        prop_assert_eq!(parse_amount(&text), Err(MoneyError::OutOfRange));
    }
}
