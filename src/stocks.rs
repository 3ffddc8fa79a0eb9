//! Stock classification into liquidity-preference classes A..D.
//!
//! Classes A, B and C score a ticker by its average triangular closeness to
//! the class profile (revenue growth, EPS growth, forward P/E, debt/EBITDA).
//! Missing metrics are dropped from the average rather than scored as 0.
//!
//! Class D is gated: hypergrowth, negative earnings, or no usable earnings
//! data at all force `D = 1.0`. Otherwise D falls back to the same closeness
//! averaging over the growth and valuation metrics only. Leverage does not
//! count against D.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{ClassTargets, ConfidenceTiers, GateTargets, MetricTargets, Target};
use crate::data::FundamentalsProvider;
use crate::domain::{ClassScores, Classification, ClassificationRecord, Fundamentals, StockClass, Ticker};
use crate::error::AppError;
use crate::math::{mean, round_dp, tri};

pub fn classify_stock(fundamentals: &Fundamentals, targets: &ClassTargets) -> Classification {
    let scores = ClassScores {
        a: profile_score(fundamentals, &targets.a),
        b: profile_score(fundamentals, &targets.b),
        c: profile_score(fundamentals, &targets.c),
        d: gated_score(fundamentals, &targets.d),
    };

    // Strictly highest wins; on an exact tie the earlier class in PRIORITY wins.
    let mut final_class = StockClass::PRIORITY[0];
    for class in StockClass::PRIORITY {
        if scores.get(class) > scores.get(final_class) {
            final_class = class;
        }
    }

    let mut ranked = StockClass::ALL.map(|c| scores.get(c));
    ranked.sort_by(|x, y| y.total_cmp(x));
    let confidence = (ranked[0] - ranked[1]).clamp(0.0, 1.0);

    Classification { scores, final_class, confidence }
}

/// True when the class D gate fires.
pub fn d_gate(f: &Fundamentals, gate: &GateTargets) -> bool {
    let hypergrowth = known(f.revenue_growth).is_some_and(|g| g >= gate.hypergrowth_threshold);
    let losing_money = known(f.eps).is_some_and(|v| v < 0.0) || known(f.ebitda).is_some_and(|v| v < 0.0);
    let no_earnings_data = !f.pe_available && known(f.eps_growth).is_none();
    hypergrowth || losing_money || no_earnings_data
}

fn gated_score(f: &Fundamentals, gate: &GateTargets) -> f64 {
    if d_gate(f, gate) {
        return 1.0;
    }
    closeness_mean(&[
        (f.revenue_growth, gate.revenue_growth),
        (f.eps_growth, gate.eps_growth),
        (f.pe_forward, gate.pe_forward),
    ])
}

fn profile_score(f: &Fundamentals, profile: &MetricTargets) -> f64 {
    closeness_mean(&[
        (f.revenue_growth, profile.revenue_growth),
        (f.eps_growth, profile.eps_growth),
        (f.pe_forward, profile.pe_forward),
        (f.debt_ebitda, profile.debt_ebitda),
    ])
}

fn closeness_mean(metrics: &[(Option<f64>, Target)]) -> f64 {
    let scores: Vec<f64> = metrics.iter().filter_map(|(value, t)| tri(*value, t.center, t.halfwidth)).collect();
    mean(&scores).unwrap_or(0.0)
}

fn known(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// Coarse reading of a classification confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f64, tiers: &ConfidenceTiers) -> Self {
        if confidence > tiers.high {
            ConfidenceTier::High
        } else if confidence >= tiers.medium {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfidenceTier::Low => "Low",
            ConfidenceTier::Medium => "Medium",
            ConfidenceTier::High => "High",
        };
        f.write_str(s)
    }
}

/// Classify many tickers in parallel. Output order follows `tickers`.
///
/// Any provider failure aborts the batch.
pub fn classify_portfolio<P>(
    provider: &P,
    tickers: &[Ticker],
    targets: &ClassTargets,
    as_of: NaiveDate,
) -> Result<Vec<ClassificationRecord>, AppError>
where
    P: FundamentalsProvider + Sync,
{
    let records = tickers
        .par_iter()
        .map(|ticker| -> Result<ClassificationRecord, AppError> {
            let fundamentals = provider.fundamentals(ticker)?;
            Ok(ClassificationRecord {
                ticker: ticker.clone(),
                date: as_of,
                classification: classify_stock(&fundamentals, targets),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(tickers = records.len(), %as_of, "classified portfolio");
    Ok(records)
}

/// Aggregate view over the latest classification of each ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total: usize,
    pub by_class: BTreeMap<StockClass, usize>,
    /// Mean confidence, 2 dp (0 for an empty portfolio).
    pub average_confidence: f64,
    /// Classifications below the Medium tier.
    pub low_confidence: usize,
}

impl PortfolioSummary {
    pub fn from_records(records: &[ClassificationRecord], tiers: &ConfidenceTiers) -> Self {
        // Latest record per ticker; a later entry wins a same-date tie.
        let mut latest: BTreeMap<&Ticker, &ClassificationRecord> = BTreeMap::new();
        for record in records {
            match latest.get(&record.ticker) {
                Some(existing) if existing.date > record.date => {}
                _ => {
                    latest.insert(&record.ticker, record);
                }
            }
        }

        let mut by_class: BTreeMap<StockClass, usize> = StockClass::ALL.into_iter().map(|c| (c, 0)).collect();
        let mut confidences = Vec::with_capacity(latest.len());
        let mut low_confidence = 0;
        for record in latest.values() {
            let c = &record.classification;
            *by_class.entry(c.final_class).or_default() += 1;
            confidences.push(c.confidence);
            if ConfidenceTier::from_confidence(c.confidence, tiers) == ConfidenceTier::Low {
                low_confidence += 1;
            }
        }

        Self {
            total: latest.len(),
            by_class,
            average_confidence: mean(&confidences).map_or(0.0, |m| round_dp(m, 2)),
            low_confidence,
        }
    }
}

/// Keep records of `class` (if given) with confidence at or above
/// `min_confidence` (if given), in their original order.
pub fn filter_records(
    records: &[ClassificationRecord],
    class: Option<StockClass>,
    min_confidence: Option<f64>,
) -> Vec<ClassificationRecord> {
    records
        .iter()
        .filter(|r| class.is_none_or(|c| r.classification.final_class == c))
        .filter(|r| min_confidence.is_none_or(|min| r.classification.confidence >= min))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryFundamentals;

    fn targets() -> ClassTargets {
        ClassTargets::default()
    }

    fn a_center() -> Fundamentals {
        Fundamentals {
            revenue_growth: Some(5.0),
            eps_growth: Some(5.0),
            pe_forward: Some(10.0),
            debt_ebitda: Some(1.0),
            eps: Some(1.0),
            ebitda: Some(1.0),
            pe_available: true,
            ..Fundamentals::default()
        }
    }

    #[test]
    fn class_a_centers_score_a_perfectly() {
        let c = classify_stock(&a_center(), &targets());
        assert_eq!(c.scores.a, 1.0);
        assert_eq!(c.final_class, StockClass::A);

        let mut others = [c.scores.b, c.scores.c, c.scores.d];
        others.sort_by(|x, y| y.total_cmp(x));
        assert!((c.confidence - (1.0 - others[0])).abs() < 1e-12);
        assert!(c.scores.d < 1.0);
    }

    #[test]
    fn hypergrowth_alone_gates_d() {
        let f = Fundamentals {
            revenue_growth: Some(60.0),
            eps_growth: Some(10.0),
            pe_available: true,
            ..Fundamentals::default()
        };
        let c = classify_stock(&f, &targets());
        assert_eq!(c.scores.d, 1.0);
        assert_eq!(c.final_class, StockClass::D);
    }

    #[test]
    fn negative_eps_beats_a_perfect_a_on_priority() {
        let f = Fundamentals { eps: Some(-1.0), ..a_center() };
        let c = classify_stock(&f, &targets());
        assert_eq!(c.scores.a, 1.0);
        assert_eq!(c.scores.d, 1.0);
        assert_eq!(c.final_class, StockClass::D);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn negative_ebitda_gates_d() {
        let f = Fundamentals { ebitda: Some(-3.0), ..a_center() };
        assert!(d_gate(&f, &targets().d));
    }

    #[test]
    fn missing_earnings_data_gates_d() {
        let f = Fundamentals {
            revenue_growth: Some(8.0),
            pe_available: false,
            eps_growth: None,
            ..Fundamentals::default()
        };
        assert!(d_gate(&f, &targets().d));

        let with_growth = Fundamentals { eps_growth: Some(4.0), ..f };
        assert!(!d_gate(&with_growth, &targets().d));
    }

    #[test]
    fn all_missing_scores_zero_unless_gated() {
        // Nothing known and no P/E: the earnings-data gate fires.
        let c = classify_stock(&Fundamentals::default(), &targets());
        assert_eq!((c.scores.a, c.scores.b, c.scores.c), (0.0, 0.0, 0.0));
        assert_eq!(c.scores.d, 1.0);
        assert_eq!(c.final_class, StockClass::D);

        // P/E flagged available but every metric missing: all zero, D by priority.
        let f = Fundamentals { pe_available: true, ..Fundamentals::default() };
        let c = classify_stock(&f, &targets());
        assert_eq!((c.scores.a, c.scores.b, c.scores.c, c.scores.d), (0.0, 0.0, 0.0, 0.0));
        assert_eq!(c.final_class, StockClass::D);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn missing_metrics_are_dropped_not_zeroed() {
        let f = Fundamentals {
            revenue_growth: Some(10.0),
            pe_forward: Some(20.0),
            eps: Some(2.0),
            pe_available: true,
            eps_growth: Some(10.0),
            ..Fundamentals::default()
        };
        // B's centers for the three known metrics; debt/EBITDA missing.
        let c = classify_stock(&f, &targets());
        assert_eq!(c.scores.b, 1.0);
        assert_eq!(c.final_class, StockClass::B);
    }

    #[test]
    fn nan_counts_as_missing() {
        let f = Fundamentals { debt_ebitda: Some(f64::NAN), ..a_center() };
        assert_eq!(classify_stock(&f, &targets()).scores.a, 1.0);
    }

    #[test]
    fn d_fallback_ignores_leverage() {
        let base = Fundamentals {
            revenue_growth: Some(40.0),
            eps_growth: Some(60.0),
            pe_forward: Some(100.0),
            eps: Some(1.0),
            ebitda: Some(1.0),
            pe_available: true,
            ..Fundamentals::default()
        };
        let levered = Fundamentals { debt_ebitda: Some(12.0), ..base.clone() };
        let t = targets();
        assert_eq!(classify_stock(&base, &t).scores.d, classify_stock(&levered, &t).scores.d);
        assert!(classify_stock(&base, &t).scores.d > 0.0);
    }

    #[test]
    fn confidence_tiers() {
        let tiers = ConfidenceTiers::default();
        assert_eq!(ConfidenceTier::from_confidence(0.41, &tiers), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_confidence(0.40, &tiers), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_confidence(0.20, &tiers), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_confidence(0.19, &tiers), ConfidenceTier::Low);
    }

    #[test]
    fn portfolio_keeps_input_order() {
        let mut provider = MemoryFundamentals::new();
        let tickers: Vec<Ticker> = ["MSFT", "KO", "NVDA"].iter().map(|t| Ticker::parse(t).unwrap()).collect();
        let growth = Fundamentals {
            revenue_growth: Some(15.0),
            eps_growth: Some(12.0),
            pe_available: true,
            ..Fundamentals::default()
        };
        let hyper = Fundamentals { revenue_growth: Some(90.0), pe_available: true, ..Fundamentals::default() };
        provider.insert(tickers[0].clone(), growth);
        provider.insert(tickers[1].clone(), a_center());
        provider.insert(tickers[2].clone(), hyper);

        let date = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
        let records = classify_portfolio(&provider, &tickers, &targets(), date).unwrap();
        let order: Vec<&str> = records.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(order, vec!["MSFT", "KO", "NVDA"]);
        assert_eq!(records[1].classification.final_class, StockClass::A);
        assert_eq!(records[2].classification.final_class, StockClass::D);
        assert!(records.iter().all(|r| r.date == date));
    }

    #[test]
    fn portfolio_fails_on_missing_ticker() {
        let provider = MemoryFundamentals::new();
        let tickers = vec![Ticker::parse("IBM").unwrap()];
        let date = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
        assert!(classify_portfolio(&provider, &tickers, &targets(), date).is_err());
    }

    #[test]
    fn summary_uses_latest_record_per_ticker() {
        let record = |ticker: &str, day: u32, class: StockClass, confidence: f64| ClassificationRecord {
            ticker: Ticker::parse(ticker).unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            classification: Classification {
                scores: ClassScores { a: 0.0, b: 0.0, c: 0.0, d: 0.0 },
                final_class: class,
                confidence,
            },
        };
        let records = vec![
            record("AAPL", 28, StockClass::B, 0.5),
            record("AAPL", 1, StockClass::D, 0.05),
            record("KO", 28, StockClass::A, 0.1),
            record("NVDA", 28, StockClass::D, 0.333),
        ];

        let summary = PortfolioSummary::from_records(&records, &ConfidenceTiers::default());
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_class[&StockClass::A], 1);
        assert_eq!(summary.by_class[&StockClass::B], 1);
        assert_eq!(summary.by_class[&StockClass::C], 0);
        assert_eq!(summary.by_class[&StockClass::D], 1);
        // (0.5 + 0.1 + 0.333) / 3 = 0.311
        assert_eq!(summary.average_confidence, 0.31);
        assert_eq!(summary.low_confidence, 1);
    }

    #[test]
    fn records_filter_by_class_and_confidence() {
        let record = |ticker: &str, class: StockClass, confidence: f64| ClassificationRecord {
            ticker: Ticker::parse(ticker).unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
            classification: Classification {
                scores: ClassScores { a: 0.0, b: 0.0, c: 0.0, d: 0.0 },
                final_class: class,
                confidence,
            },
        };
        let records = vec![
            record("KO", StockClass::A, 0.9),
            record("SNOW", StockClass::D, 0.2),
            record("PG", StockClass::A, 0.1),
            record("NVDA", StockClass::D, 0.6),
        ];

        let names = |rs: Vec<ClassificationRecord>| rs.iter().map(|r| r.ticker.to_string()).collect::<Vec<_>>();
        assert_eq!(names(filter_records(&records, None, None)).len(), 4);
        assert_eq!(names(filter_records(&records, Some(StockClass::A), None)), vec!["KO", "PG"]);
        assert_eq!(names(filter_records(&records, None, Some(0.2))), vec!["KO", "SNOW", "NVDA"]);
        assert_eq!(names(filter_records(&records, Some(StockClass::D), Some(0.5))), vec!["NVDA"]);
    }

    #[test]
    fn empty_summary() {
        let summary = PortfolioSummary::from_records(&[], &ConfidenceTiers::default());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average_confidence, 0.0);
        assert!(summary.by_class.values().all(|n| *n == 0));
    }
}
