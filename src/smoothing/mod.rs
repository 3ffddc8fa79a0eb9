//! Moving-average pipeline.
//!
//! Turns raw macro history into one `DerivedPoint` per history date:
//!
//! 1. merge duplicate dates (later fields win) and sort
//! 2. per indicator, pull its source field; price indices become YoY % changes
//! 3. evaluate a trailing calendar-month mean at every history date
//!
//! The whole history is recomputed on each run. The cost is `O(n log n + n·w)`
//! for `n` dates and `w` points per window, which is fine for a batch step run
//! after new data lands.

pub mod moving_average;
pub mod yoy;

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::{EngineConfig, Transform};
use crate::data::{MacroReader, MacroWriter};
use crate::domain::{DerivedPoint, MacroPoint};
use crate::error::AppError;

pub use moving_average::{moving_average, trailing_mean};
pub use yoy::year_over_year;

/// Compute smoothed (and YoY) series for every date in `raw`.
///
/// `raw` is not modified and need not be sorted.
pub fn update_moving_averages(raw: &[MacroPoint], config: &EngineConfig) -> Vec<DerivedPoint> {
    let history = merge_by_date(raw);
    let dates: Vec<NaiveDate> = history.keys().copied().collect();
    let mut rows: Vec<DerivedPoint> = dates.iter().map(|d| DerivedPoint::new(*d)).collect();

    for (&indicator, spec) in &config.indicators {
        let levels: Vec<(NaiveDate, f64)> = history
            .iter()
            .filter_map(|(date, point)| point.get(spec.source).map(|v| (*date, v)))
            .collect();

        let input = match spec.transform {
            Transform::Level => levels,
            Transform::YearOverYear => {
                let changes = year_over_year(&levels, &config.smoothing);
                for &(date, value) in &changes {
                    if let Ok(idx) = dates.binary_search(&date) {
                        rows[idx].yoy.insert(indicator, value);
                    }
                }
                changes
            }
        };

        let averages = moving_average(&input, &dates, spec.window_months);
        let defined = averages.iter().filter(|v| v.is_some()).count();
        tracing::debug!(
            indicator = %indicator,
            window_months = spec.window_months,
            inputs = input.len(),
            defined,
            "smoothed indicator"
        );

        for (row, avg) in rows.iter_mut().zip(averages) {
            if let Some(v) = avg {
                row.smoothed.insert(indicator, v);
            }
        }
    }

    rows
}

/// Batch step: recompute all derived rows from the store and write them back.
///
/// Each date's row is handed to the writer whole, never field by field.
pub fn refresh_store<S>(store: &mut S, config: &EngineConfig) -> Result<usize, AppError>
where
    S: MacroReader + MacroWriter,
{
    let raw = store.read_all()?;
    if raw.is_empty() {
        return Err(AppError::data("No macro history to smooth."));
    }

    let rows = update_moving_averages(&raw, config);
    let written = store.upsert_derived(&rows)?;
    tracing::info!(points = raw.len(), written, "updated moving averages");
    Ok(written)
}

fn merge_by_date(raw: &[MacroPoint]) -> BTreeMap<NaiveDate, MacroPoint> {
    let mut history: BTreeMap<NaiveDate, MacroPoint> = BTreeMap::new();
    for point in raw {
        history
            .entry(point.date)
            .and_modify(|existing| existing.values.extend(point.values.iter().map(|(k, v)| (*k, *v))))
            .or_insert_with(|| point.clone());
    }
    history
}
