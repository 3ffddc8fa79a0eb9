//! Year-over-year percentage change for price-index series.

use chrono::{Duration, NaiveDate};

use crate::config::SmoothingConfig;

/// YoY % change at every date that has a usable observation roughly a year back.
///
/// `series` must be sorted by date. For each point the prior observation is the
/// one whose age lies in `[yoy_min_days, yoy_max_days]` and is closest to
/// `yoy_target_days` (ties resolve to the older observation). Dates without
/// such a point, or whose prior value is zero, are left out.
pub fn year_over_year(series: &[(NaiveDate, f64)], window: &SmoothingConfig) -> Vec<(NaiveDate, f64)> {
    let mut out = Vec::new();

    for &(date, value) in series {
        let earliest = date - Duration::days(window.yoy_max_days);
        let latest = date - Duration::days(window.yoy_min_days);
        let lo = series.partition_point(|(d, _)| *d < earliest);
        let hi = series.partition_point(|(d, _)| *d <= latest);
        if lo >= hi {
            continue;
        }

        let prior = series[lo..hi].iter().min_by_key(|(d, _)| ((date - *d).num_days() - window.yoy_target_days).abs());

        if let Some(&(_, prev)) = prior {
            if prev != 0.0 {
                out.push((date, (value - prev) / prev * 100.0));
            }
        }
    }

    out
}
