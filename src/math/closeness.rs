//! Triangular closeness.
//!
//! The atomic "how well does this metric match a class's ideal" unit:
//!
//! ```text
//! tri(x; c, h) = max(0, 1 - |x - c| / h)
//! ```
//!
//! It is 1 at the center and falls linearly to 0 at distance `h`. Missing input
//! yields `None` so callers can drop the metric instead of scoring it as 0.

/// Triangular closeness of `x` to `center`.
///
/// Returns `None` when `x` is missing or NaN.
pub fn tri(x: Option<f64>, center: f64, halfwidth: f64) -> Option<f64> {
    let x = x.filter(|v| !v.is_nan())?;
    Some((1.0 - (x - center).abs() / halfwidth).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_at_center() {
        for (c, h) in [(5.0, 5.0), (-0.7, 0.35), (150.0, 100.0)] {
            assert_eq!(tri(Some(c), c, h), Some(1.0));
        }
    }

    #[test]
    fn zero_at_halfwidth_and_beyond() {
        assert_eq!(tri(Some(10.0), 5.0, 5.0), Some(0.0));
        assert_eq!(tri(Some(0.0), 5.0, 5.0), Some(0.0));
        assert_eq!(tri(Some(1_000.0), 5.0, 5.0), Some(0.0));
    }

    #[test]
    fn linear_in_between() {
        let v = tri(Some(7.5), 5.0, 5.0).unwrap();
        assert!((v - 0.5).abs() < 1e-12);
        let v = tri(Some(8.5), 10.0, 6.0).unwrap();
        assert!((v - 0.75).abs() < 1e-12);
    }

    #[test]
    fn never_negative() {
        let mut x = -500.0;
        while x <= 500.0 {
            let v = tri(Some(x), 20.0, 10.0).unwrap();
            assert!(v >= 0.0, "tri({x}) = {v}");
            x += 3.7;
        }
    }

    #[test]
    fn missing_or_nan_is_none() {
        assert_eq!(tri(None, 5.0, 5.0), None);
        assert_eq!(tri(Some(f64::NAN), 5.0, 5.0), None);
    }
}
