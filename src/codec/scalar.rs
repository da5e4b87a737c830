//! SEG-Y scale factors.
//!
//! A scalar is a signed 16-bit multiplier: positive values multiply the stored
//! integer, negative values divide by their magnitude, zero means no scaling.

const TEN_K: i64 = 10_000;

/// Multiplier implied by a SEG-Y scalar.
#[must_use]
pub fn parse_scalar(scalar: i16) -> f64 {
    match scalar {
        0 => 1.0,
        s if s > 0 => f64::from(s),
        s => 1.0 / f64::from(s).abs(),
    }
}

/// Smallest scale that keeps the integer part of `value` in 32 bits while
/// preserving as many of its first four decimals as possible.
///
/// Values whose integer part overflows `i32` get a positive multiplier
/// (10 to 10000); `0` is returned when even 10000 is not enough. Integral
/// values get `1`.
#[must_use]
pub fn find_scalar(value: f64) -> i16 {
    let int_part = value.trunc() as i64;
    if i32::try_from(int_part).is_err() {
        let mut scalar = 10;
        while scalar <= TEN_K {
            if i32::try_from(int_part / scalar).is_ok() {
                return scalar as i16;
            }
            scalar *= 10;
        }
        return 0;
    }

    let digits = (value * TEN_K as f64).round() as i64 - int_part * TEN_K;
    if digits != 0 {
        let mut step = 1;
        while step < TEN_K {
            if digits % (step * 10) != 0 {
                let scalar = (-TEN_K / step) as i16;
                let stored = (value / parse_scalar(scalar)).round();
                if fits_i32(stored) && (stored as i64) / -i64::from(scalar) == int_part {
                    return scalar;
                }
            }
            step *= 10;
        }
    }
    1
}

/// Merge two scalars competing for one header slot.
///
/// A multiplier above 1 means an integer part would overflow otherwise, so the
/// largest wins; otherwise the finest divisor wins.
#[must_use]
pub fn combine_scalars(a: i16, b: i16) -> i16 {
    if a > 1 || b > 1 { a.max(b) } else { a.min(b) }
}

/// Legal scalars ordered from finest to coarsest.
const LADDER: [i16; 9] = [-10_000, -1000, -100, -10, 1, 10, 100, 1000, 10_000];

/// First scalar no finer than `scalar` that stores every value in `values`
/// within 32 bits, or `None` when even 10000 overflows.
#[must_use]
pub fn coarsen_scalar(scalar: i16, values: &[f64]) -> Option<i16> {
    let wanted = parse_scalar(scalar);
    LADDER
        .iter()
        .copied()
        .filter(|&s| parse_scalar(s) >= wanted)
        .find(|&s| values.iter().all(|&v| fits_i32((v / parse_scalar(s)).round())))
}

pub(crate) fn fits_i32(value: f64) -> bool {
    value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scalar_conventions() {
        assert_eq!(parse_scalar(0), 1.0);
        assert_eq!(parse_scalar(1), 1.0);
        assert_eq!(parse_scalar(100), 100.0);
        assert_eq!(parse_scalar(-100), 0.01);
        assert_eq!(parse_scalar(-10000), 0.0001);
    }

    #[test]
    fn integral_values_need_no_scale() {
        assert_eq!(find_scalar(0.0), 1);
        assert_eq!(find_scalar(1_234_567.0), 1);
        assert_eq!(find_scalar(-42.0), 1);
    }

    #[test]
    fn fractional_values_pick_the_needed_divisor() {
        assert_eq!(find_scalar(1.1), -10);
        assert_eq!(find_scalar(1.25), -100);
        assert_eq!(find_scalar(-3.125), -1000);
        assert_eq!(find_scalar(0.0001), -10000);
        // only the first four decimals are considered
        assert_eq!(find_scalar(2.00001), 1);
    }

    #[test]
    fn large_fractional_values_fall_back_to_coarser_divisors() {
        // 300000.0001 * 10000 overflows i32, * 1000 keeps the integer part
        assert_eq!(find_scalar(300_000.0001), -1000);
        // 500000.5 * 10 fits
        assert_eq!(find_scalar(500_000.5), -10);
    }

    #[test]
    fn huge_values_use_multipliers() {
        assert_eq!(find_scalar(3e9), 10);
        assert_eq!(find_scalar(-5e11), 1000);
        assert_eq!(find_scalar(1e15), 0);
    }

    #[test]
    fn scale_selection_property() {
        let mut rng = fastrand::Rng::with_seed(0x5E67);
        for _ in 0..2000 {
            let magnitude = 10f64.powi(rng.i32(0..9));
            let value = (rng.f64() - 0.5) * magnitude;
            let scalar = find_scalar(value);
            let stored = (value / parse_scalar(scalar)).round();
            assert!(fits_i32(stored), "{value} with {scalar}");
            let int_part = value.trunc();
            let restored = stored * parse_scalar(scalar);
            assert!(
                (restored.trunc() - int_part).abs() <= 1.0,
                "{value} restored as {restored}"
            );
        }
    }

    #[test]
    fn combining_prefers_multipliers_then_finest_divisor() {
        assert_eq!(combine_scalars(1, -100), -100);
        assert_eq!(combine_scalars(-10, -1000), -1000);
        assert_eq!(combine_scalars(-1000, 10), 10);
        assert_eq!(combine_scalars(100, 10), 100);
        assert_eq!(combine_scalars(1, 1), 1);
    }

    #[test]
    fn coarsening_steps_until_every_value_fits() {
        assert_eq!(coarsen_scalar(-10_000, &[0.1234, 6_123_456.5]), Some(-10));
        assert_eq!(coarsen_scalar(-100, &[1.25, 2.5]), Some(-100));
        assert_eq!(coarsen_scalar(-10_000, &[0.0001, 3e9]), Some(10));
        // never finer than asked for
        assert_eq!(coarsen_scalar(100, &[1.0]), Some(100));
        assert_eq!(coarsen_scalar(0, &[1e15]), None);
    }
}
