//! Indicator classification.
//!
//! Each smoothed indicator value is banded against its fixed `[low, high]`
//! thresholds and the band is mapped to a signed unit score per sentiment axis.

use std::collections::BTreeMap;

use crate::config::IndicatorSpec;
use crate::domain::{Band, ClassifiedIndicator, DerivedPoint, Indicator, Thresholds};

/// Band a value: `< low` is Low, `> high` is High, anything else Normal.
/// Missing or NaN values are Unknown.
pub fn classify_value(value: Option<f64>, thresholds: Thresholds) -> Band {
    match value {
        None => Band::Unknown,
        Some(v) if v.is_nan() => Band::Unknown,
        Some(v) if v < thresholds.low => Band::Low,
        Some(v) if v > thresholds.high => Band::High,
        Some(_) => Band::Normal,
    }
}

/// Classify one indicator value with its configured spec.
pub fn classify_indicator(indicator: Indicator, value: Option<f64>, spec: &IndicatorSpec) -> ClassifiedIndicator {
    let band = classify_value(value, spec.thresholds);
    ClassifiedIndicator {
        indicator,
        value: value.filter(|v| !v.is_nan()),
        band,
        thresholds: Some(spec.thresholds),
        fps_score: spec.fps.and_then(|p| p.score(band)),
        gps_score: spec.gps.and_then(|p| p.score(band)),
    }
}

/// Classify every configured indicator from one derived (smoothed) row.
pub fn classify_all_indicators(
    row: &DerivedPoint,
    specs: &BTreeMap<Indicator, IndicatorSpec>,
) -> BTreeMap<Indicator, ClassifiedIndicator> {
    specs
        .iter()
        .map(|(&indicator, spec)| (indicator, classify_indicator(indicator, row.smoothed(indicator), spec)))
        .collect()
}
