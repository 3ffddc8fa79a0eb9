//! Engine configuration.
//!
//! Every table the scoring pipeline consults lives here and is passed into the
//! pure functions explicitly. `EngineConfig::default()` carries the production
//! tables; a JSON file can override any subset of them:
//!
//! ```json
//! { "allocation": { "tilt_magnitude": 0.15 } }
//! ```
//!
//! The file is merged key by key over the defaults, so maps such as
//! `weights.fps` or `allocation.base` keep every entry the file does not name.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Allocation, Band, Indicator, MacroField, Regime, Thresholds};
use crate::error::AppError;

/// Ideal value of one metric for one class, and the distance at which the
/// closeness score reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub center: f64,
    pub halfwidth: f64,
}

impl Target {
    pub const fn new(center: f64, halfwidth: f64) -> Self {
        Self { center, halfwidth }
    }
}

/// Target profile of classes A, B and C.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricTargets {
    pub revenue_growth: Target,
    pub eps_growth: Target,
    pub pe_forward: Target,
    pub debt_ebitda: Target,
}

/// Class D: a hard gate plus a leverage-free fallback profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateTargets {
    /// Revenue growth (%) at or above which D is forced.
    pub hypergrowth_threshold: f64,
    pub revenue_growth: Target,
    pub eps_growth: Target,
    pub pe_forward: Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassTargets {
    pub a: MetricTargets,
    pub b: MetricTargets,
    pub c: MetricTargets,
    pub d: GateTargets,
}

impl Default for ClassTargets {
    fn default() -> Self {
        Self {
            a: MetricTargets {
                revenue_growth: Target::new(5.0, 5.0),
                eps_growth: Target::new(5.0, 5.0),
                pe_forward: Target::new(10.0, 6.0),
                debt_ebitda: Target::new(1.0, 1.0),
            },
            b: MetricTargets {
                revenue_growth: Target::new(10.0, 5.0),
                eps_growth: Target::new(10.0, 7.0),
                pe_forward: Target::new(20.0, 6.0),
                debt_ebitda: Target::new(3.0, 1.5),
            },
            c: MetricTargets {
                revenue_growth: Target::new(20.0, 10.0),
                eps_growth: Target::new(10.0, 10.0),
                pe_forward: Target::new(25.0, 10.0),
                debt_ebitda: Target::new(5.0, 2.0),
            },
            d: GateTargets {
                hypergrowth_threshold: 50.0,
                revenue_growth: Target::new(60.0, 30.0),
                eps_growth: Target::new(80.0, 40.0),
                pe_forward: Target::new(150.0, 100.0),
            },
        }
    }
}

/// How a raw field becomes the series that is smoothed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Smooth the published level.
    Level,
    /// Smooth the year-over-year percentage change (price indices).
    YearOverYear,
}

/// Direction in which an indicator's band pushes a sentiment axis.
///
/// `Normal` always maps to 0 and `Unknown` to `None`, whatever the polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// High → +1, Low → −1.
    Procyclical,
    /// High → −1, Low → +1.
    Countercyclical,
}

impl Polarity {
    pub fn score(self, band: Band) -> Option<i8> {
        match (self, band) {
            (_, Band::Unknown) => None,
            (_, Band::Normal) => Some(0),
            (Polarity::Procyclical, Band::High) | (Polarity::Countercyclical, Band::Low) => Some(1),
            (Polarity::Procyclical, Band::Low) | (Polarity::Countercyclical, Band::High) => Some(-1),
        }
    }
}

/// Everything needed to derive, band and score one indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub source: MacroField,
    pub transform: Transform,
    /// Trailing moving-average window in calendar months.
    pub window_months: u32,
    pub thresholds: Thresholds,
    /// Band → FPS polarity; `None` means the indicator does not feed FPS.
    pub fps: Option<Polarity>,
    /// Band → GPS polarity; `None` means the indicator does not feed GPS.
    pub gps: Option<Polarity>,
}

fn indicator_spec(
    source: MacroField,
    transform: Transform,
    window_months: u32,
    (low, high): (f64, f64),
    fps: Option<Polarity>,
    gps: Option<Polarity>,
) -> IndicatorSpec {
    IndicatorSpec { source, transform, window_months, thresholds: Thresholds { low, high }, fps, gps }
}

pub fn default_indicator_specs() -> BTreeMap<Indicator, IndicatorSpec> {
    use Polarity::{Countercyclical as Counter, Procyclical as Pro};
    use Transform::{Level, YearOverYear};

    BTreeMap::from([
        (
            Indicator::Unemployment,
            indicator_spec(MacroField::Unemployment, Level, 6, (4.0, 5.5), Some(Counter), Some(Counter)),
        ),
        (
            Indicator::JoblessClaims,
            indicator_spec(MacroField::JoblessClaims, Level, 3, (250_000.0, 350_000.0), Some(Counter), Some(Counter)),
        ),
        (
            Indicator::NonfarmPayrolls,
            indicator_spec(MacroField::NonfarmPayrolls, Level, 9, (50_000.0, 250_000.0), Some(Pro), Some(Pro)),
        ),
        (Indicator::CpiYoy, indicator_spec(MacroField::Cpi, YearOverYear, 9, (2.0, 3.0), Some(Pro), None)),
        (Indicator::CoreCpiYoy, indicator_spec(MacroField::CoreCpi, YearOverYear, 9, (2.0, 3.0), Some(Pro), None)),
        (Indicator::Ppi, indicator_spec(MacroField::Ppi, Level, 12, (0.0, 0.2), Some(Pro), None)),
        (Indicator::Cfnai, indicator_spec(MacroField::Cfnai, Level, 6, (-0.7, 0.35), Some(Pro), Some(Pro))),
        (
            Indicator::IndustrialProduction,
            indicator_spec(MacroField::IndustrialProduction, Level, 9, (0.0, 0.2), Some(Pro), Some(Pro)),
        ),
        (Indicator::RetailSales, indicator_spec(MacroField::RetailSales, Level, 9, (0.0, 0.4), Some(Pro), Some(Pro))),
        (
            Indicator::ConsumerConfidence,
            indicator_spec(MacroField::ConsumerSentiment, Level, 12, (100.0, 120.0), Some(Pro), Some(Pro)),
        ),
    ])
}

/// YoY look-back tolerance, in days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub yoy_min_days: i64,
    pub yoy_target_days: i64,
    pub yoy_max_days: i64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        // 11..=13 months of 30 days, aiming for one calendar year.
        Self { yoy_min_days: 330, yoy_target_days: 365, yoy_max_days: 390 }
    }
}

/// Per-axis weights. Indicators missing from a table do not feed that axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTables {
    pub fps: BTreeMap<Indicator, f64>,
    pub gps: BTreeMap<Indicator, f64>,
}

impl Default for WeightTables {
    fn default() -> Self {
        Self {
            fps: BTreeMap::from([
                (Indicator::Unemployment, 1.5),
                (Indicator::JoblessClaims, 1.0),
                (Indicator::NonfarmPayrolls, 1.5),
                (Indicator::CpiYoy, 1.5),
                (Indicator::CoreCpiYoy, 2.0),
                (Indicator::Ppi, 1.0),
                (Indicator::Cfnai, 1.0),
                (Indicator::IndustrialProduction, 0.5),
                (Indicator::RetailSales, 1.0),
                (Indicator::ConsumerConfidence, 0.5),
            ]),
            gps: BTreeMap::from([
                (Indicator::Unemployment, 1.5),
                (Indicator::JoblessClaims, 1.0),
                (Indicator::NonfarmPayrolls, 2.0),
                (Indicator::Cfnai, 1.5),
                (Indicator::IndustrialProduction, 0.5),
                (Indicator::RetailSales, 1.5),
                (Indicator::ConsumerConfidence, 1.0),
            ]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Balance-sheet slope look-back (12 weeks).
    pub balance_sheet_lookback_days: i64,
    /// Rate range look-back (1 year).
    pub rate_lookback_days: i64,
    /// Absolute slope at which the balance-sheet signal saturates.
    pub balance_sheet_saturation: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self { balance_sheet_lookback_days: 84, rate_lookback_days: 365, balance_sheet_saturation: 1e9 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TieBreakConfig {
    /// Tie-break only runs while `|fps|` is at most this.
    pub fps_neutral_band: f64,
    /// `|gps|` must exceed this to shift between B and C.
    pub gps_threshold: f64,
    /// Fraction of the donor class moved.
    pub shift_fraction: f64,
    /// Cap on the moved amount, in percentage points.
    pub max_shift: f64,
}

impl Default for TieBreakConfig {
    fn default() -> Self {
        Self { fps_neutral_band: 0.2, gps_threshold: 0.3, shift_fraction: 0.2, max_shift: 7.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub base: BTreeMap<Regime, Allocation>,
    /// FPS of ±1 shifts `tilt_magnitude * 100` percentage points.
    pub tilt_magnitude: f64,
    /// Tilts smaller than this (percentage points) are ignored.
    pub min_tilt: f64,
    pub tie_break: TieBreakConfig,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            base: BTreeMap::from([
                (Regime::MostLiquid, Allocation::new(10.0, 20.0, 30.0, 40.0)),
                (Regime::InBetweenPreferC, Allocation::new(15.0, 25.0, 40.0, 20.0)),
                (Regime::InBetweenPreferB, Allocation::new(15.0, 40.0, 30.0, 15.0)),
                (Regime::LeastLiquid, Allocation::new(60.0, 30.0, 10.0, 0.0)),
            ]),
            tilt_magnitude: 0.25,
            min_tilt: 0.5,
            tie_break: TieBreakConfig::default(),
        }
    }
}

/// Thresholds for the report's warning lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub divergence_threshold: f64,
    pub stagflation_gps_below: f64,
    pub stagflation_fps_above: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { divergence_threshold: 0.5, stagflation_gps_below: -0.3, stagflation_fps_above: 0.3 }
    }
}

/// Classification confidence tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceTiers {
    /// Strictly above this is High.
    pub high: f64,
    /// At or above this is Medium; anything lower is Low.
    pub medium: f64,
}

impl Default for ConfidenceTiers {
    fn default() -> Self {
        Self { high: 0.40, medium: 0.20 }
    }
}

/// The complete set of tables consulted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub class_targets: ClassTargets,
    pub confidence_tiers: ConfidenceTiers,
    pub indicators: BTreeMap<Indicator, IndicatorSpec>,
    pub smoothing: SmoothingConfig,
    pub weights: WeightTables,
    pub regime: RegimeConfig,
    pub allocation: AllocationConfig,
    pub report: ReportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            class_targets: ClassTargets::default(),
            confidence_tiers: ConfidenceTiers::default(),
            indicators: default_indicator_specs(),
            smoothing: SmoothingConfig::default(),
            weights: WeightTables::default(),
            regime: RegimeConfig::default(),
            allocation: AllocationConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load a config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let file = File::open(path)
            .map_err(|e| AppError::io(format!("Failed to open config '{}': {e}", path.display())))?;
        let overrides: Value =
            serde_json::from_reader(file).map_err(|e| AppError::config(format!("{}: {e}", path.display())))?;
        let config = Self::from_overrides(overrides)?;

        tracing::debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// Apply a JSON document over the defaults and validate the result.
    ///
    /// Objects merge recursively; any other value replaces the default.
    pub fn from_overrides(overrides: Value) -> Result<Self, AppError> {
        if !overrides.is_object() {
            return Err(AppError::config("configuration must be a JSON object"));
        }
        let mut merged = serde_json::to_value(Self::default())
            .map_err(|e| AppError::config(format!("Failed to encode default configuration: {e}")))?;
        merge_json(&mut merged, overrides);

        let config: EngineConfig = serde_json::from_value(merged).map_err(|e| AppError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tables that would make the pure functions produce NaN or nonsense.
    pub fn validate(&self) -> Result<(), AppError> {
        let t = &self.class_targets;
        let mut targets = Vec::new();
        for (class, m) in [("A", &t.a), ("B", &t.b), ("C", &t.c)] {
            targets.push((class, "revenue_growth", m.revenue_growth));
            targets.push((class, "eps_growth", m.eps_growth));
            targets.push((class, "pe_forward", m.pe_forward));
            targets.push((class, "debt_ebitda", m.debt_ebitda));
        }
        targets.push(("D", "revenue_growth", t.d.revenue_growth));
        targets.push(("D", "eps_growth", t.d.eps_growth));
        targets.push(("D", "pe_forward", t.d.pe_forward));
        for (class, metric, target) in targets {
            if !(target.halfwidth.is_finite() && target.halfwidth > 0.0 && target.center.is_finite()) {
                return Err(AppError::config(format!(
                    "class {class} target for {metric} needs a finite center and a positive halfwidth"
                )));
            }
        }
        if !t.d.hypergrowth_threshold.is_finite() {
            return Err(AppError::config("class D hypergrowth threshold must be finite"));
        }

        if !(self.confidence_tiers.medium <= self.confidence_tiers.high) {
            return Err(AppError::config("confidence tier medium must not exceed high"));
        }

        for (indicator, spec) in &self.indicators {
            if !(3..=12).contains(&spec.window_months) {
                return Err(AppError::config(format!(
                    "{indicator}: window_months must be within 3..=12, got {}",
                    spec.window_months
                )));
            }
            let th = spec.thresholds;
            if !(th.low.is_finite() && th.high.is_finite() && th.low <= th.high) {
                return Err(AppError::config(format!("{indicator}: thresholds need low <= high")));
            }
        }

        let s = &self.smoothing;
        if !(0 < s.yoy_min_days && s.yoy_min_days <= s.yoy_target_days && s.yoy_target_days <= s.yoy_max_days) {
            return Err(AppError::config("smoothing: need 0 < yoy_min_days <= yoy_target_days <= yoy_max_days"));
        }

        for (axis, table) in [("fps", &self.weights.fps), ("gps", &self.weights.gps)] {
            if let Some((indicator, w)) = table.iter().find(|(_, w)| !(w.is_finite() && **w >= 0.0)) {
                return Err(AppError::config(format!("{axis} weight for {indicator} must be >= 0, got {w}")));
            }
        }

        if s.yoy_max_days > MAX_LOOKBACK_DAYS {
            return Err(AppError::config(format!("smoothing: yoy_max_days must be at most {MAX_LOOKBACK_DAYS}")));
        }

        let r = &self.regime;
        let lookbacks = [r.balance_sheet_lookback_days, r.rate_lookback_days];
        if lookbacks.iter().any(|days| !(1..=MAX_LOOKBACK_DAYS).contains(days)) {
            return Err(AppError::config(format!("regime look-backs must be within 1..={MAX_LOOKBACK_DAYS} days")));
        }
        if !(r.balance_sheet_saturation.is_finite() && r.balance_sheet_saturation > 0.0) {
            return Err(AppError::config("regime balance_sheet_saturation must be positive"));
        }

        let a = &self.allocation;
        for (regime, base) in &a.base {
            let parts = [base.a, base.b, base.c, base.d];
            if parts.iter().any(|v| !(v.is_finite() && *v >= 0.0)) || base.sum() <= 0.0 {
                return Err(AppError::config(format!(
                    "base allocation for '{regime}' needs non-negative parts with a positive total"
                )));
            }
        }
        if !(0.0..=1.0).contains(&a.tilt_magnitude) {
            return Err(AppError::config("allocation tilt_magnitude must be within [0, 1]"));
        }
        if !(0.0..=100.0).contains(&a.min_tilt) {
            return Err(AppError::config("allocation min_tilt must be within [0, 100]"));
        }
        let tb = &a.tie_break;
        if !(0.0..=1.0).contains(&tb.fps_neutral_band) || !(0.0..=1.0).contains(&tb.gps_threshold) {
            return Err(AppError::config("tie_break fps_neutral_band and gps_threshold must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&tb.shift_fraction) || !(0.0..=100.0).contains(&tb.max_shift) {
            return Err(AppError::config(
                "tie_break shift_fraction must be within [0, 1] and max_shift within [0, 100]",
            ));
        }

        Ok(())
    }
}

/// Ten years; keeps day arithmetic on dates far from chrono's limits.
const MAX_LOOKBACK_DAYS: i64 = 3650;

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
