//! Liquidity regime classification.
//!
//! Two signals decide the regime:
//!
//! - where today's policy rate sits inside its trailing 1-year range
//!   (`percentile < 0.5` means rates are low)
//! - whether the central-bank balance sheet grew over the last 12 weeks
//!
//! The regime is the fixed 2x2 table in `Regime::from_signals`. This is
//! independent of FPS/GPS.

use chrono::{Duration, NaiveDate};

use crate::config::RegimeConfig;
use crate::domain::{MacroField, MacroPoint, Regime, RegimeAssessment, RegimeMetrics};
use crate::error::AppError;
use crate::math::round_dp;

/// Classify the regime from raw history (any order).
///
/// Fails with `AppError::InsufficientHistory` when the balance sheet has no
/// observation at least `balance_sheet_lookback_days` before its latest print,
/// or the rate series does not reach back `rate_lookback_days`.
pub fn classify_regime(history: &[MacroPoint], config: &RegimeConfig) -> Result<RegimeAssessment, AppError> {
    let rates = field_series(history, MacroField::FedFunds);
    let balance = field_series(history, MacroField::BalanceSheet);

    let &(rate_as_of, rate_today) = rates
        .last()
        .ok_or_else(|| AppError::insufficient_history("no policy-rate observations"))?;
    let &(bs_as_of, bs_today) = balance
        .last()
        .ok_or_else(|| AppError::insufficient_history("no balance-sheet observations"))?;

    // Balance sheet trend.
    let bs_cutoff = bs_as_of - Duration::days(config.balance_sheet_lookback_days);
    let &(_, bs_prior) = balance
        .iter()
        .rev()
        .find(|(d, _)| *d <= bs_cutoff)
        .ok_or_else(|| {
            AppError::insufficient_history(format!(
                "balance sheet needs an observation on or before {bs_cutoff} ({} days before {bs_as_of})",
                config.balance_sheet_lookback_days
            ))
        })?;
    let slope = bs_today - bs_prior;
    let increasing = slope > 0.0;

    // Rate positioning within the trailing year.
    let rate_cutoff = rate_as_of - Duration::days(config.rate_lookback_days);
    let covers_lookback = rates.first().is_some_and(|(d, _)| *d <= rate_cutoff);
    if !covers_lookback {
        return Err(AppError::insufficient_history(format!(
            "policy rate needs {} days of history (back to {rate_cutoff})",
            config.rate_lookback_days
        )));
    }
    let (rate_min, rate_max) = rates
        .iter()
        .filter(|(d, _)| *d >= rate_cutoff)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| (lo.min(*v), hi.max(*v)));

    let range = rate_max - rate_min;
    let percentile = if range > 0.0 { (rate_today - rate_min) / range } else { 0.5 };
    let rate_is_low = percentile < 0.5;

    let regime = Regime::from_signals(rate_is_low, increasing);
    let confidence = regime_confidence(percentile, slope, config.balance_sheet_saturation);

    tracing::debug!(regime = %regime, percentile, slope, confidence, "classified regime");

    Ok(RegimeAssessment {
        regime,
        confidence,
        metrics: RegimeMetrics {
            fed_funds_rate: rate_today,
            rate_min_1y: rate_min,
            rate_max_1y: rate_max,
            rate_percentile: percentile,
            rate_is_low,
            balance_sheet: bs_today,
            balance_sheet_slope: slope,
            balance_sheet_increasing: increasing,
            balance_sheet_change_12w_bn: round_dp(slope / 1e9, 1),
            rate_as_of,
            balance_sheet_as_of: bs_as_of,
        },
    })
}

/// Mean of the two normalized signal strengths, as a 0-100 integer score.
///
/// The rate signal is 0 at the 50th percentile and 1 at either extreme; the
/// balance-sheet signal saturates at `|slope| == saturation`.
pub fn regime_confidence(percentile: f64, slope: f64, saturation: f64) -> f64 {
    let rate_signal = ((percentile - 0.5).abs() * 2.0).min(1.0);
    let bs_signal = (slope.abs() / saturation).min(1.0);
    ((rate_signal + bs_signal) / 2.0 * 100.0).round()
}

fn field_series(history: &[MacroPoint], field: MacroField) -> Vec<(NaiveDate, f64)> {
    let mut series: Vec<(NaiveDate, f64)> = history.iter().filter_map(|p| p.get(field).map(|v| (p.date, v))).collect();
    // Stable sort: for duplicate dates the later record stays last.
    series.sort_by_key(|(d, _)| *d);
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Weekly history over `weeks` weeks ending 2024-12-25.
    fn weekly_history(weeks: i64, rate: impl Fn(i64) -> f64, bs: impl Fn(i64) -> f64) -> Vec<MacroPoint> {
        let end = d(2024, 12, 25);
        (0..weeks)
            .map(|i| {
                let date = end - Duration::weeks(weeks - 1 - i);
                MacroPoint::new(date).with(MacroField::FedFunds, rate(i)).with(MacroField::BalanceSheet, bs(i))
            })
            .collect()
    }

    #[test]
    fn falling_rates_and_growing_balance_sheet_is_most_liquid() {
        let history = weekly_history(60, |i| 5.5 - 0.05 * i as f64, |i| 7.0e12 + 1.0e10 * i as f64);
        let r = classify_regime(&history, &RegimeConfig::default()).unwrap();

        assert_eq!(r.regime, Regime::MostLiquid);
        assert!(r.metrics.rate_is_low);
        assert!(r.metrics.balance_sheet_increasing);
        assert_eq!(r.metrics.rate_percentile, 0.0);
        // 12 weeks of +10bn.
        assert!((r.metrics.balance_sheet_slope - 1.2e11).abs() < 1.0);
        assert_eq!(r.metrics.balance_sheet_change_12w_bn, 120.0);
        // Both signals saturated.
        assert_eq!(r.confidence, 100.0);
    }

    #[test]
    fn high_rates_and_shrinking_balance_sheet_is_least_liquid() {
        let history = weekly_history(60, |i| 3.0 + 0.05 * i as f64, |i| 8.0e12 - 2.0e9 * i as f64);
        let r = classify_regime(&history, &RegimeConfig::default()).unwrap();
        assert_eq!(r.regime, Regime::LeastLiquid);
        assert!(!r.metrics.rate_is_low);
        assert!(!r.metrics.balance_sheet_increasing);
    }

    #[test]
    fn in_between_quadrants() {
        let config = RegimeConfig::default();
        let prefer_c = weekly_history(60, |i| 5.5 - 0.05 * i as f64, |i| 8.0e12 - 1.0e9 * i as f64);
        assert_eq!(classify_regime(&prefer_c, &config).unwrap().regime, Regime::InBetweenPreferC);

        let prefer_b = weekly_history(60, |i| 3.0 + 0.05 * i as f64, |i| 7.0e12 + 1.0e9 * i as f64);
        assert_eq!(classify_regime(&prefer_b, &config).unwrap().regime, Regime::InBetweenPreferB);
    }

    #[test]
    fn flat_rates_sit_at_the_midpoint() {
        let history = weekly_history(60, |_| 5.33, |i| 7.0e12 + 1.0e8 * i as f64);
        let r = classify_regime(&history, &RegimeConfig::default()).unwrap();
        assert_eq!(r.metrics.rate_percentile, 0.5);
        // 0.5 is not low.
        assert_eq!(r.regime, Regime::InBetweenPreferB);
        // Rate signal 0, balance sheet 1.2e9 saturates at 1.
        assert_eq!(r.confidence, 50.0);
    }

    #[test]
    fn flat_balance_sheet_is_not_increasing() {
        let history = weekly_history(60, |i| 5.5 - 0.05 * i as f64, |_| 7.0e12);
        let r = classify_regime(&history, &RegimeConfig::default()).unwrap();
        assert_eq!(r.regime, Regime::InBetweenPreferC);
    }

    #[test]
    fn short_rate_history_is_an_error() {
        // 30 weeks: enough for the balance sheet, not for the rate range.
        let history = weekly_history(30, |_| 5.0, |i| 7.0e12 + 1.0e9 * i as f64);
        let err = classify_regime(&history, &RegimeConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::InsufficientHistory(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn short_balance_sheet_history_is_an_error() {
        let mut history: Vec<MacroPoint> = (0..400)
            .map(|i| MacroPoint::new(d(2024, 1, 1) + Duration::days(i)).with(MacroField::FedFunds, 5.0))
            .collect();
        let last = history.len() - 1;
        history[last].set(MacroField::BalanceSheet, 7.0e12);
        history[last - 14].set(MacroField::BalanceSheet, 7.1e12);

        let err = classify_regime(&history, &RegimeConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::InsufficientHistory(_)));
    }

    #[test]
    fn empty_history_is_an_error() {
        assert!(classify_regime(&[], &RegimeConfig::default()).is_err());
    }

    #[test]
    fn confidence_formula() {
        // percentile 0.75 -> rate signal 0.5; slope at half saturation -> 0.5.
        assert_eq!(regime_confidence(0.75, 5.0e8, 1e9), 50.0);
        assert_eq!(regime_confidence(0.5, 0.0, 1e9), 0.0);
        assert_eq!(regime_confidence(1.0, -3.0e9, 1e9), 100.0);
    }
}
