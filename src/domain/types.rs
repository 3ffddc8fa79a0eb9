//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed by reference through the pure scoring functions
//! - exported as JSON reports
//! - round-tripped through the CSV history store

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Raw macro fields stored per history date.
///
/// Units follow what the ingest layer writes: the balance sheet is stored in
/// currency units (FRED publishes WALCL in millions, we scale on ingest), rates
/// and spreads in percent, activity series as published or as percent changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroField {
    BalanceSheet,
    FedFunds,
    YieldSpread,
    Unemployment,
    JoblessClaims,
    NonfarmPayrolls,
    Cpi,
    CoreCpi,
    Ppi,
    Cfnai,
    IndustrialProduction,
    RetailSales,
    ConsumerSentiment,
}

impl MacroField {
    pub const ALL: [MacroField; 13] = [
        MacroField::BalanceSheet,
        MacroField::FedFunds,
        MacroField::YieldSpread,
        MacroField::Unemployment,
        MacroField::JoblessClaims,
        MacroField::NonfarmPayrolls,
        MacroField::Cpi,
        MacroField::CoreCpi,
        MacroField::Ppi,
        MacroField::Cfnai,
        MacroField::IndustrialProduction,
        MacroField::RetailSales,
        MacroField::ConsumerSentiment,
    ];

    /// Column name used by the CSV history file.
    pub fn column(self) -> &'static str {
        match self {
            MacroField::BalanceSheet => "walcl",
            MacroField::FedFunds => "dff",
            MacroField::YieldSpread => "t10y2y",
            MacroField::Unemployment => "unrate",
            MacroField::JoblessClaims => "jobless_claims",
            MacroField::NonfarmPayrolls => "nonfarm_payrolls",
            MacroField::Cpi => "cpi",
            MacroField::CoreCpi => "core_cpi",
            MacroField::Ppi => "ppi",
            MacroField::Cfnai => "cfnai",
            MacroField::IndustrialProduction => "indpro",
            MacroField::RetailSales => "retail_sales",
            MacroField::ConsumerSentiment => "consumer_sentiment",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        MacroField::ALL.into_iter().find(|f| f.column() == name)
    }
}

/// One history date and whatever raw fields were observed on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroPoint {
    pub date: NaiveDate,
    pub values: BTreeMap<MacroField, f64>,
}

impl MacroPoint {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, values: BTreeMap::new() }
    }

    /// Builder-style setter, handy for fixtures.
    pub fn with(mut self, field: MacroField, value: f64) -> Self {
        self.set(field, value);
        self
    }

    /// Set a field; non-finite values are treated as missing.
    pub fn set(&mut self, field: MacroField, value: f64) {
        if value.is_finite() {
            self.values.insert(field, value);
        } else {
            self.values.remove(&field);
        }
    }

    pub fn get(&self, field: MacroField) -> Option<f64> {
        self.values.get(&field).copied()
    }
}

/// The ten indicators that feed FPS / GPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Unemployment,
    JoblessClaims,
    NonfarmPayrolls,
    CpiYoy,
    CoreCpiYoy,
    Ppi,
    Cfnai,
    IndustrialProduction,
    RetailSales,
    ConsumerConfidence,
}

impl Indicator {
    pub const ALL: [Indicator; 10] = [
        Indicator::Unemployment,
        Indicator::JoblessClaims,
        Indicator::NonfarmPayrolls,
        Indicator::CpiYoy,
        Indicator::CoreCpiYoy,
        Indicator::Ppi,
        Indicator::Cfnai,
        Indicator::IndustrialProduction,
        Indicator::RetailSales,
        Indicator::ConsumerConfidence,
    ];

    /// Stable snake_case key (CSV derived columns, JSON keys).
    pub fn key(self) -> &'static str {
        match self {
            Indicator::Unemployment => "unemployment",
            Indicator::JoblessClaims => "jobless_claims",
            Indicator::NonfarmPayrolls => "nonfarm_payrolls",
            Indicator::CpiYoy => "cpi_yoy",
            Indicator::CoreCpiYoy => "core_cpi_yoy",
            Indicator::Ppi => "ppi",
            Indicator::Cfnai => "cfnai",
            Indicator::IndustrialProduction => "indpro",
            Indicator::RetailSales => "retail_sales",
            Indicator::ConsumerConfidence => "consumer_confidence",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Indicator::Unemployment => "Unemployment",
            Indicator::JoblessClaims => "Jobless Claims",
            Indicator::NonfarmPayrolls => "Nonfarm Payrolls",
            Indicator::CpiYoy => "CPI YoY",
            Indicator::CoreCpiYoy => "Core CPI YoY",
            Indicator::Ppi => "PPI",
            Indicator::Cfnai => "CFNAI",
            Indicator::IndustrialProduction => "Industrial Prod.",
            Indicator::RetailSales => "Retail Sales",
            Indicator::ConsumerConfidence => "Consumer Conf.",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Smoothed (and, for price indices, YoY) values derived for one history date.
///
/// Only defined values are present in the maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedPoint {
    pub date: NaiveDate,
    pub smoothed: BTreeMap<Indicator, f64>,
    pub yoy: BTreeMap<Indicator, f64>,
}

impl DerivedPoint {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, smoothed: BTreeMap::new(), yoy: BTreeMap::new() }
    }

    pub fn smoothed(&self, indicator: Indicator) -> Option<f64> {
        self.smoothed.get(&indicator).copied()
    }
}

/// Threshold band of a single indicator value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Band {
    Low,
    Normal,
    High,
    Unknown,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Band::Low => "Low",
            Band::Normal => "Normal",
            Band::High => "High",
            Band::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Fixed `[low, high]` band boundaries for one indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
}

/// A smoothed indicator value with its band and per-axis unit scores.
///
/// `None` scores mean "no information" and are skipped by the score calculator;
/// they are never the same thing as a neutral 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedIndicator {
    pub indicator: Indicator,
    pub value: Option<f64>,
    pub band: Band,
    pub thresholds: Option<Thresholds>,
    pub fps_score: Option<i8>,
    pub gps_score: Option<i8>,
}

/// Which sentiment score is being computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Fps,
    Gps,
}

/// One indicator's share of a sentiment score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub indicator: Indicator,
    pub value: Option<f64>,
    pub band: Band,
    pub score: i8,
    pub weight: f64,
    pub contribution: f64,
}

/// A weighted sentiment score (FPS or GPS) with its breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub axis: Axis,
    /// Weighted mean of unit scores, in `[-1, 1]`.
    pub value: f64,
    /// `|value| * 100`; a strength proxy, not a statistical confidence.
    pub confidence: f64,
    pub interpretation: String,
    pub breakdown: Vec<Contribution>,
    pub total_weight: f64,
}

/// Discrete liquidity regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Regime {
    #[serde(rename = "Most Liquid")]
    MostLiquid,
    #[serde(rename = "In Between (prefer C)")]
    InBetweenPreferC,
    #[serde(rename = "In Between (prefer B)")]
    InBetweenPreferB,
    #[serde(rename = "Least Liquid")]
    LeastLiquid,
}

impl Regime {
    pub const ALL: [Regime; 4] = [
        Regime::MostLiquid,
        Regime::InBetweenPreferC,
        Regime::InBetweenPreferB,
        Regime::LeastLiquid,
    ];

    /// The fixed 2x2 table on (rate is low, balance sheet increasing).
    pub fn from_signals(rate_is_low: bool, balance_sheet_increasing: bool) -> Self {
        match (rate_is_low, balance_sheet_increasing) {
            (true, true) => Regime::MostLiquid,
            (true, false) => Regime::InBetweenPreferC,
            (false, true) => Regime::InBetweenPreferB,
            (false, false) => Regime::LeastLiquid,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Regime::MostLiquid => "Most Liquid",
            Regime::InBetweenPreferC => "In Between (prefer C)",
            Regime::InBetweenPreferB => "In Between (prefer B)",
            Regime::LeastLiquid => "Least Liquid",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Regime::MostLiquid => "Low Rates + Balance Sheet Increasing",
            Regime::InBetweenPreferC => "Low Rates + Balance Sheet Decreasing",
            Regime::InBetweenPreferB => "High Rates + Balance Sheet Increasing",
            Regime::LeastLiquid => "High Rates + Balance Sheet Decreasing",
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            Regime::MostLiquid => "Allocate 0-100%+ to Class D stocks",
            Regime::InBetweenPreferC => "Allocate 0-50% to Class C (or B) stocks",
            Regime::InBetweenPreferB => "Allocate 0-50% to Class B (or C) stocks",
            Regime::LeastLiquid => "Allocate 0-20% to Class A stocks",
        }
    }

    pub fn is_in_between(self) -> bool {
        matches!(self, Regime::InBetweenPreferC | Regime::InBetweenPreferB)
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Regime {
    type Err = AppError;

    /// Accepts the display label (case-insensitive), its kebab form such as
    /// `in-between-prefer-c`, or the short `prefer-b` / `prefer c` aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = kebab(s);
        for regime in Regime::ALL {
            let full = kebab(regime.label());
            let short = full.strip_prefix("in-between-");
            if wanted == full || short == Some(wanted.as_str()) {
                return Ok(regime);
            }
        }
        Err(AppError::config(format!(
            "Unknown regime label '{s}' (expected most-liquid, prefer-c, prefer-b or least-liquid)."
        )))
    }
}

fn kebab(s: &str) -> String {
    s.to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// The numbers that produced a regime call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeMetrics {
    pub fed_funds_rate: f64,
    pub rate_min_1y: f64,
    pub rate_max_1y: f64,
    pub rate_percentile: f64,
    pub rate_is_low: bool,
    pub balance_sheet: f64,
    pub balance_sheet_slope: f64,
    pub balance_sheet_increasing: bool,
    /// 12-week balance sheet change in billions, 1 dp.
    pub balance_sheet_change_12w_bn: f64,
    pub rate_as_of: NaiveDate,
    pub balance_sheet_as_of: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeAssessment {
    pub regime: Regime,
    /// 0..=100.
    pub confidence: f64,
    pub metrics: RegimeMetrics,
}

/// Stock liquidity-preference class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StockClass {
    A,
    B,
    C,
    D,
}

impl StockClass {
    pub const ALL: [StockClass; 4] = [StockClass::A, StockClass::B, StockClass::C, StockClass::D];

    /// Tie-break priority: the first class in this list wins an exact tie.
    pub const PRIORITY: [StockClass; 4] =
        [StockClass::D, StockClass::C, StockClass::B, StockClass::A];
}

impl fmt::Display for StockClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StockClass::A => "A",
            StockClass::B => "B",
            StockClass::C => "C",
            StockClass::D => "D",
        };
        f.write_str(s)
    }
}

impl FromStr for StockClass {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(StockClass::A),
            "B" => Ok(StockClass::B),
            "C" => Ok(StockClass::C),
            "D" => Ok(StockClass::D),
            _ => Err(AppError::config(format!("Unknown stock class '{s}' (expected A, B, C or D)."))),
        }
    }
}

/// Percentage split across classes A..D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
    #[serde(rename = "C")]
    pub c: f64,
    #[serde(rename = "D")]
    pub d: f64,
}

impl Allocation {
    pub const fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    pub const fn uniform() -> Self {
        Self::new(25.0, 25.0, 25.0, 25.0)
    }

    /// Raw floating-point sum.
    pub fn sum(&self) -> f64 {
        self.a + self.b + self.c + self.d
    }

    /// Sum counted in tenths of a percent.
    ///
    /// Normalized allocations are 1-dp quantities, so this is the exact total
    /// (`1000` for a normalized split) without binary floating-point drift.
    pub fn total_tenths(&self) -> i64 {
        [self.a, self.b, self.c, self.d].iter().map(|v| (v * 10.0).round() as i64).sum()
    }

    /// Exact total of a 1-dp allocation, in percent.
    pub fn total(&self) -> f64 {
        self.total_tenths() as f64 / 10.0
    }
}

/// Which allocation step produced an intermediate split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    #[serde(rename = "Base Allocation")]
    Base,
    #[serde(rename = "FPS Tilt")]
    FpsTilt,
    #[serde(rename = "GPS Tie-Break")]
    GpsTieBreak,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepKind::Base => "Base Allocation",
            StepKind::FpsTilt => "FPS Tilt",
            StepKind::GpsTieBreak => "GPS Tie-Break",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationStep {
    pub step: StepKind,
    pub allocation: Allocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Signed tilt in percentage points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub allocation: Allocation,
    pub steps: Vec<AllocationStep>,
}

/// Per-ticker fundamentals as supplied by the fundamentals provider.
///
/// Growth figures are percentages (`12.5` means 12.5%). Any numeric field may be
/// missing; NaN is treated the same as missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fundamentals {
    pub revenue_growth: Option<f64>,
    pub eps_growth: Option<f64>,
    pub pe_forward: Option<f64>,
    pub debt_ebitda: Option<f64>,
    pub eps: Option<f64>,
    pub ebitda: Option<f64>,
    pub eps_positive: Option<bool>,
    pub ebitda_positive: Option<bool>,
    pub pe_available: bool,
}

/// Per-class match scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
    #[serde(rename = "C")]
    pub c: f64,
    #[serde(rename = "D")]
    pub d: f64,
}

impl ClassScores {
    pub fn get(&self, class: StockClass) -> f64 {
        match class {
            StockClass::A => self.a,
            StockClass::B => self.b,
            StockClass::C => self.c,
            StockClass::D => self.d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub scores: ClassScores,
    pub final_class: StockClass,
    /// Gap between the best and second-best score, in `[0, 1]`.
    pub confidence: f64,
}

/// A validated ticker symbol (1-5 ASCII letters, upper-cased).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let sanitized = raw.trim().to_ascii_uppercase();
        let valid = (1..=5).contains(&sanitized.len())
            && sanitized.chars().all(|c| c.is_ascii_uppercase());
        if !valid {
            return Err(AppError::config(format!("Invalid ticker '{raw}' (expected 1-5 letters).")));
        }
        Ok(Self(sanitized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ticker {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ticker::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a ticker's classification history, keyed by `(ticker, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub ticker: Ticker,
    pub date: NaiveDate,
    pub classification: Classification,
}
