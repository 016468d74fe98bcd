/// Divide `numerator` by `denominator`, rounding to `precision` fractional digits.
///
/// A zero denominator yields `0.0`: ratio metrics never produce an error, `NaN`
/// or infinity. Every ratio-type derived metric goes through this function.
pub fn safe_divide(numerator: f64, denominator: f64, precision: u32) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    round_to(numerator / denominator, precision)
}

/// Round half away from zero to `precision` fractional digits.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_denominator_is_zero() {
        for n in [0.0, 1.0, -4.5, 1e9] {
            for p in [0, 1, 3, 6] {
                assert_eq!(safe_divide(n, 0.0, p), 0.0);
            }
        }
    }

    #[test]
    fn test_exact_quotient() {
        assert_eq!(safe_divide(6.0, 3.0, 3), 2.0);
        assert_eq!(safe_divide(10.0, 5.0, 3), 2.0);
    }

    #[test]
    fn test_rounds_to_precision() {
        assert_eq!(safe_divide(1.0, 3.0, 3), 0.333);
        assert_eq!(safe_divide(2.0, 3.0, 3), 0.667);
        assert_eq!(safe_divide(2.0, 3.0, 1), 0.7);
        assert_eq!(safe_divide(7.0, 2.0, 0), 4.0);
    }

    #[test]
    fn test_zero_numerator() {
        assert_eq!(safe_divide(0.0, 12.0, 3), 0.0);
    }

    #[test]
    fn test_round_to_negative() {
        assert_eq!(round_to(-1.2345, 2), -1.23);
        assert_eq!(round_to(-0.5, 0), -1.0);
    }
}
