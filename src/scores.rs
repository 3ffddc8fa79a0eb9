//! Fed Pressure Score (FPS) and Growth Pulse Score (GPS).
//!
//! Both are weighted means of the classified indicators' unit scores:
//!
//! ```text
//! score = Σ(score_i · w_i) / Σ w_i
//! ```
//!
//! over indicators that have a positive weight on the axis and a known score.
//! With no usable indicator the score is defined as 0.

use std::collections::BTreeMap;

use crate::config::WeightTables;
use crate::domain::{Axis, ClassifiedIndicator, Contribution, Indicator, SentimentScore};

pub fn calculate_fps(classified: &BTreeMap<Indicator, ClassifiedIndicator>, weights: &WeightTables) -> SentimentScore {
    weighted_score(Axis::Fps, classified, &weights.fps)
}

pub fn calculate_gps(classified: &BTreeMap<Indicator, ClassifiedIndicator>, weights: &WeightTables) -> SentimentScore {
    weighted_score(Axis::Gps, classified, &weights.gps)
}

/// Human-readable reading of an FPS value.
pub fn interpret_fps(fps: f64) -> &'static str {
    if fps > 0.5 {
        "Strong Contractionary Pressure"
    } else if fps > 0.2 {
        "Moderate Hawkish Pressure"
    } else if fps > -0.2 {
        "Neutral Fed Policy"
    } else if fps > -0.5 {
        "Moderate Dovish Pressure"
    } else {
        "Strong Expansionary Pressure"
    }
}

/// Human-readable reading of a GPS value.
pub fn interpret_gps(gps: f64) -> &'static str {
    if gps > 0.5 {
        "Very Strong Growth"
    } else if gps > 0.2 {
        "Moderate Growth"
    } else if gps > -0.2 {
        "Neutral"
    } else if gps > -0.5 {
        "Weak Growth"
    } else {
        "Recessionary"
    }
}

fn weighted_score(
    axis: Axis,
    classified: &BTreeMap<Indicator, ClassifiedIndicator>,
    weights: &BTreeMap<Indicator, f64>,
) -> SentimentScore {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut breakdown = Vec::new();

    for (indicator, item) in classified {
        let Some(&weight) = weights.get(indicator).filter(|w| **w > 0.0) else {
            continue;
        };
        let score = match axis {
            Axis::Fps => item.fps_score,
            Axis::Gps => item.gps_score,
        };
        let Some(score) = score else {
            continue;
        };

        let contribution = f64::from(score) * weight;
        weighted_sum += contribution;
        total_weight += weight;
        breakdown.push(Contribution {
            indicator: *indicator,
            value: item.value,
            band: item.band,
            score,
            weight,
            contribution,
        });
    }

    let value = if total_weight > 0.0 { weighted_sum / total_weight } else { 0.0 };
    let interpretation = match axis {
        Axis::Fps => interpret_fps(value),
        Axis::Gps => interpret_gps(value),
    };

    SentimentScore {
        axis,
        value,
        confidence: value.abs() * 100.0,
        interpretation: interpretation.to_string(),
        breakdown,
        total_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Band;

    fn item(indicator: Indicator, band: Band, fps: Option<i8>, gps: Option<i8>) -> (Indicator, ClassifiedIndicator) {
        (
            indicator,
            ClassifiedIndicator { indicator, value: Some(1.0), band, thresholds: None, fps_score: fps, gps_score: gps },
        )
    }

    #[test]
    fn weighted_mean_of_known_scores() {
        let classified = BTreeMap::from([
            item(Indicator::CoreCpiYoy, Band::High, Some(1), None),     // w 2.0
            item(Indicator::Unemployment, Band::High, Some(-1), Some(-1)), // w 1.5
            item(Indicator::Ppi, Band::Normal, Some(0), None),           // w 1.0
        ]);
        let weights = WeightTables::default();

        let fps = calculate_fps(&classified, &weights);
        // (2.0 - 1.5 + 0) / 4.5
        assert!((fps.value - 0.5 / 4.5).abs() < 1e-12);
        assert!((fps.total_weight - 4.5).abs() < 1e-12);
        assert_eq!(fps.breakdown.len(), 3);
        assert!((fps.confidence - fps.value.abs() * 100.0).abs() < 1e-12);

        let gps = calculate_gps(&classified, &weights);
        assert!((gps.value + 1.0).abs() < 1e-12);
        assert!((gps.total_weight - 1.5).abs() < 1e-12);
        assert_eq!(gps.interpretation, "Recessionary");
    }

    #[test]
    fn unknown_indicators_do_not_dilute_the_score() {
        let known_only = BTreeMap::from([item(Indicator::Cfnai, Band::High, Some(1), Some(1))]);
        let mut with_unknown = known_only.clone();
        with_unknown.extend([item(Indicator::RetailSales, Band::Unknown, None, None)]);

        let weights = WeightTables::default();
        let a = calculate_gps(&known_only, &weights);
        let b = calculate_gps(&with_unknown, &weights);
        assert_eq!(a.value, 1.0);
        assert_eq!(b.value, 1.0);
        assert_eq!(b.breakdown.len(), 1);
    }

    #[test]
    fn zero_total_weight_scores_zero() {
        let classified = BTreeMap::from([
            item(Indicator::Unemployment, Band::Unknown, None, None),
            item(Indicator::CpiYoy, Band::Unknown, None, None),
        ]);
        let fps = calculate_fps(&classified, &WeightTables::default());
        assert_eq!(fps.value, 0.0);
        assert_eq!(fps.total_weight, 0.0);
        assert!(fps.breakdown.is_empty());
        assert_eq!(fps.interpretation, "Neutral Fed Policy");
    }

    #[test]
    fn zero_weight_indicator_is_skipped() {
        let mut weights = WeightTables::default();
        weights.fps.insert(Indicator::Ppi, 0.0);
        let classified = BTreeMap::from([item(Indicator::Ppi, Band::High, Some(1), None)]);
        let fps = calculate_fps(&classified, &weights);
        assert_eq!(fps.value, 0.0);
        assert!(fps.breakdown.is_empty());
    }

    #[test]
    fn interpretation_bands() {
        assert_eq!(interpret_gps(0.6), "Very Strong Growth");
        assert_eq!(interpret_gps(0.5), "Moderate Growth");
        assert_eq!(interpret_gps(0.0), "Neutral");
        assert_eq!(interpret_gps(-0.2), "Weak Growth");
        assert_eq!(interpret_gps(-0.5), "Recessionary");

        assert_eq!(interpret_fps(0.51), "Strong Contractionary Pressure");
        assert_eq!(interpret_fps(0.3), "Moderate Hawkish Pressure");
        assert_eq!(interpret_fps(0.2), "Neutral Fed Policy");
        assert_eq!(interpret_fps(-0.3), "Moderate Dovish Pressure");
        assert_eq!(interpret_fps(-0.9), "Strong Expansionary Pressure");
    }
}
