//! Delta computation between consecutive source readings.

use rust_decimal::Decimal;

/// Amount to add to a running total given the previous and new source value.
///
/// Rules:
/// - No previous value: the first observation only establishes the baseline,
///   so nothing is added.
/// - Net consumption: the raw difference, which may be negative (export).
/// - Gross consumption with a decreasing value: the source reset and restarted
///   from near zero, so the new value itself is the delta.
pub fn delta(prev: Option<Decimal>, new: Decimal, net_consumption: bool) -> Decimal {
    let Some(prev) = prev else {
        return Decimal::ZERO;
    };
    let raw = new - prev;
    if net_consumption {
        raw
    } else if raw < Decimal::ZERO {
        new
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("test literal is a valid decimal")
    }

    #[test]
    fn first_observation_is_baseline_only() {
        assert_eq!(delta(None, dec("42.5"), false), Decimal::ZERO);
        assert_eq!(delta(None, dec("42.5"), true), Decimal::ZERO);
    }

    #[test]
    fn gross_increase_is_the_difference() {
        assert_eq!(delta(Some(dec("2")), dec("3"), false), dec("1"));
        assert_eq!(delta(Some(dec("3")), dec("6"), false), dec("3"));
    }

    #[test]
    fn gross_decrease_treats_new_value_as_fresh_baseline_delta() {
        // Source rolled over / restarted: no negative contribution.
        assert_eq!(delta(Some(dec("100")), dec("2"), false), dec("2"));
    }

    #[test]
    fn gross_equal_values_add_nothing() {
        assert_eq!(delta(Some(dec("5")), dec("5"), false), Decimal::ZERO);
    }

    #[test]
    fn net_mode_permits_negative_deltas() {
        assert_eq!(delta(Some(dec("2")), dec("1"), true), dec("-1"));
        assert_eq!(delta(Some(dec("1")), dec("4"), true), dec("3"));
    }

    #[test]
    fn decimal_precision_is_preserved() {
        assert_eq!(delta(Some(dec("0.1")), dec("0.3"), false), dec("0.2"));
    }
}
