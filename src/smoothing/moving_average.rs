//! Trailing calendar-month moving averages.

use chrono::{Months, NaiveDate};

/// Mean of the observations dated in `(at - window_months, at]`.
///
/// `series` must be sorted by date. Values are summed oldest first, so the
/// same inputs always produce the same bits.
pub fn trailing_mean(series: &[(NaiveDate, f64)], at: NaiveDate, window_months: u32) -> Option<f64> {
    let start = at.checked_sub_months(Months::new(window_months)).unwrap_or(NaiveDate::MIN);

    let lo = series.partition_point(|(d, _)| *d <= start);
    let hi = series.partition_point(|(d, _)| *d <= at);
    if lo >= hi {
        return None;
    }

    let window = &series[lo..hi];
    let sum: f64 = window.iter().map(|(_, v)| v).sum();
    Some(sum / window.len() as f64)
}

/// Evaluate the trailing mean at each of `dates`.
pub fn moving_average(series: &[(NaiveDate, f64)], dates: &[NaiveDate], window_months: u32) -> Vec<Option<f64>> {
    dates.iter().map(|&at| trailing_mean(series, at, window_months)).collect()
}
