use rust_decimal::{Decimal, RoundingStrategy};

/// Default number of decimal places money fields are rounded to.
pub const DEFAULT_DECIMAL_ROUND_TO: u32 = 2;

/// Round half away from zero to `dp` places, keeping trailing zeros so that
/// stored values render with a fixed scale (`10` -> `10.00`).
pub fn round_to(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded
}

pub fn default_decimal_round_to() -> u32 {
    DEFAULT_DECIMAL_ROUND_TO
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_to(Decimal::from_str("2.345").unwrap(), 2).to_string(), "2.35");
        assert_eq!(round_to(Decimal::from_str("-2.345").unwrap(), 2).to_string(), "-2.35");
        assert_eq!(round_to(Decimal::from_str("2.344").unwrap(), 2).to_string(), "2.34");
    }

    #[test]
    fn test_round_pads_scale() {
        assert_eq!(round_to(Decimal::from(10), 2).to_string(), "10.00");
        assert_eq!(round_to(Decimal::from_str("1.5").unwrap(), 0).to_string(), "2");
    }
}
