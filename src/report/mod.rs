//! Regime report: the regime call, the two sentiment scores and the
//! allocation, plus human-readable interpretation and warnings.
//!
//! `build_report` is a pure function over history snapshots; `format` renders
//! the result for the terminal.

pub mod format;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::allocation::AllocationEngine;
use crate::config::{EngineConfig, ReportConfig};
use crate::domain::{
    AllocationResult, ClassifiedIndicator, DerivedPoint, Indicator, MacroField, MacroPoint, RegimeAssessment,
    SentimentScore,
};
use crate::error::AppError;
use crate::indicators::classify_all_indicators;
use crate::regime::classify_regime;
use crate::scores::{calculate_fps, calculate_gps};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeReport {
    /// Date of the derived row the scores were computed from.
    pub as_of: NaiveDate,
    pub regime: RegimeAssessment,
    pub indicators: BTreeMap<Indicator, ClassifiedIndicator>,
    pub fps: SentimentScore,
    pub gps: SentimentScore,
    pub allocation: AllocationResult,
    /// 10Y-2Y spread from the latest observation, if any.
    pub yield_spread: Option<f64>,
    pub interpretation: Vec<String>,
    pub warnings: Vec<String>,
    /// `round(0.5 * regime confidence + 0.5 * FPS confidence)`.
    pub overall_confidence: f64,
}

/// Build the full report. Fails if the regime cannot be classified or there
/// is no derived row to score.
pub fn build_report(
    raw: &[MacroPoint],
    derived: &[DerivedPoint],
    config: &EngineConfig,
) -> Result<RegimeReport, AppError> {
    let regime = classify_regime(raw, &config.regime)?;

    let latest = derived
        .iter()
        .max_by_key(|row| row.date)
        .ok_or_else(|| AppError::data("No smoothed indicators available; run `smooth` first."))?;

    let indicators = classify_all_indicators(latest, &config.indicators);
    let fps = calculate_fps(&indicators, &config.weights);
    let gps = calculate_gps(&indicators, &config.weights);

    let allocation = AllocationEngine::new(&config.allocation).calculate(regime.regime, fps.value, gps.value);
    let yield_spread = latest_value(raw, MacroField::YieldSpread);

    let interpretation = interpretation_lines(&regime, &fps, &gps);
    let warnings = warning_lines(fps.value, gps.value, yield_spread, &config.report);
    let overall_confidence = (0.5 * regime.confidence + 0.5 * fps.confidence).round();

    tracing::info!(
        as_of = %latest.date,
        regime = %regime.regime,
        fps = fps.value,
        gps = gps.value,
        warnings = warnings.len(),
        "built regime report"
    );

    Ok(RegimeReport {
        as_of: latest.date,
        regime,
        indicators,
        fps,
        gps,
        allocation,
        yield_spread,
        interpretation,
        warnings,
        overall_confidence,
    })
}

fn interpretation_lines(regime: &RegimeAssessment, fps: &SentimentScore, gps: &SentimentScore) -> Vec<String> {
    vec![
        format!("Current Regime: {}", regime.regime),
        regime.regime.description().to_string(),
        format!("Fed Policy Bias: {} (FPS: {:.2})", fps.interpretation, fps.value),
        format!("Economic Growth: {} (GPS: {:.2})", gps.interpretation, gps.value),
    ]
}

fn warning_lines(fps: f64, gps: f64, yield_spread: Option<f64>, config: &ReportConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Some(spread) = yield_spread.filter(|s| *s < 0.0) {
        warnings.push(format!("Yield curve inverted ({spread:.2}%) - recession risk"));
    }
    if (fps - gps).abs() > config.divergence_threshold {
        warnings.push("FPS/GPS divergence detected - mixed signals".to_string());
    }
    if gps < config.stagflation_gps_below && fps > config.stagflation_fps_above {
        warnings.push("Stagflation risk: Weak growth + Hawkish Fed".to_string());
    }
    warnings
}

fn latest_value(raw: &[MacroPoint], field: MacroField) -> Option<f64> {
    raw.iter().filter_map(|p| p.get(field).map(|v| (p.date, v))).max_by_key(|(date, _)| *date).map(|(_, v)| v)
}
