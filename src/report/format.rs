//! Formatted terminal output.
//!
//! All text rendering lives here so the scoring code returns plain data and
//! output changes stay localized.

use crate::config::ConfidenceTiers;
use crate::domain::{Allocation, AllocationResult, Band, ClassificationRecord, ClassifiedIndicator, SentimentScore};
use crate::report::RegimeReport;
use crate::stocks::{ConfidenceTier, PortfolioSummary};

/// Full regime report: regime call, indicators, scores, allocation, notes.
pub fn format_report(report: &RegimeReport) -> String {
    let mut out = String::new();
    let r = &report.regime;
    let m = &r.metrics;

    out.push_str("=== lr - Liquidity Regime Report ===\n");
    out.push_str(&format!("As-of: {}\n", report.as_of));
    out.push_str(&format!("Regime: {} (confidence {:.0})\n", r.regime, r.confidence));
    out.push_str(&format!("  {}\n", r.regime.recommendation()));
    out.push_str(&format!(
        "  Fed funds {:.2}% (as of {}) | 1y range [{:.2}, {:.2}] | percentile {:.2}\n",
        m.fed_funds_rate, m.rate_as_of, m.rate_min_1y, m.rate_max_1y, m.rate_percentile
    ));
    out.push_str(&format!(
        "  Balance sheet {:.1}bn (as of {}) | 12w change {:+.1}bn\n",
        m.balance_sheet / 1e9,
        m.balance_sheet_as_of,
        m.balance_sheet_change_12w_bn
    ));
    if let Some(spread) = report.yield_spread {
        out.push_str(&format!("  10Y-2Y spread {spread:+.2}%\n"));
    }

    out.push_str("\nIndicators:\n");
    out.push_str(&format_indicators(report.indicators.values()));

    out.push('\n');
    out.push_str(&format_score("FPS", &report.fps));
    out.push_str(&format_score("GPS", &report.gps));

    out.push_str("\nAllocation:\n");
    out.push_str(&format_allocation(&report.allocation));

    out.push('\n');
    for line in &report.interpretation {
        out.push_str(&format!("- {line}\n"));
    }
    for line in &report.warnings {
        out.push_str(&format!("! {line}\n"));
    }
    out.push_str(&format!("Overall confidence: {:.0}\n", report.overall_confidence));

    out
}

fn format_indicators<'a>(rows: impl Iterator<Item = &'a ClassifiedIndicator>) -> String {
    let mut out = String::new();
    push_line(&mut out, format!("{:<28} {:>14} {:<8} {:>4} {:>4}", "indicator", "value", "band", "fps", "gps"));
    push_line(&mut out, format!("{:-<28} {:-<14} {:-<8} {:-<4} {:-<4}", "", "", "", "", ""));
    for row in rows {
        push_line(
            &mut out,
            format!(
                "{:<28} {:>14} {:<8} {:>4} {:>4}",
                truncate(row.indicator.display_name(), 28),
                fmt_opt(row.value),
                band_label(row.band),
                fmt_unit(row.fps_score),
                fmt_unit(row.gps_score),
            ),
        );
    }
    out
}

fn format_score(label: &str, score: &SentimentScore) -> String {
    format!(
        "{label}: {:+.2} ({}) | weight {:.1} over {} indicators\n",
        score.value,
        score.interpretation,
        score.total_weight,
        score.breakdown.len()
    )
}

/// Allocation steps followed by the final split.
pub fn format_allocation(result: &AllocationResult) -> String {
    let mut out = String::new();
    push_line(&mut out, format!("{:<16} {:>6} {:>6} {:>6} {:>6}  {}", "step", "A", "B", "C", "D", "detail"));
    push_line(&mut out, format!("{:-<16} {:-<6} {:-<6} {:-<6} {:-<6}  {:-<6}", "", "", "", "", "", ""));
    for step in &result.steps {
        let detail = match (&step.regime, step.tilt, step.gps) {
            (Some(regime), _, _) => regime.clone(),
            (_, Some(tilt), _) => format!("tilt {tilt:+.1}pp"),
            (_, _, Some(gps)) => format!("gps {gps:+.2}"),
            _ => String::new(),
        };
        push_line(&mut out, format!("{:<16} {}  {detail}", step.step.to_string(), fmt_alloc(&step.allocation)));
    }
    push_line(&mut out, format!("{:<16} {}", "Final", fmt_alloc(&result.allocation)));
    out
}

/// Per-ticker classification table.
pub fn format_classifications(records: &[ClassificationRecord], tiers: &ConfidenceTiers) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<6} {:<5} {:>5} {:>5} {:>5} {:>5} {:>6} {:<6}",
            "ticker", "class", "A", "B", "C", "D", "conf", "tier"
        ),
    );
    push_line(
        &mut out,
        format!("{:-<6} {:-<5} {:-<5} {:-<5} {:-<5} {:-<5} {:-<6} {:-<6}", "", "", "", "", "", "", "", ""),
    );
    for record in records {
        let c = &record.classification;
        push_line(
            &mut out,
            format!(
                "{:<6} {:<5} {:>5.2} {:>5.2} {:>5.2} {:>5.2} {:>6.2} {:<6}",
                record.ticker.as_str(),
                c.final_class.to_string(),
                c.scores.a,
                c.scores.b,
                c.scores.c,
                c.scores.d,
                c.confidence,
                ConfidenceTier::from_confidence(c.confidence, tiers).to_string(),
            ),
        );
    }
    out
}

pub fn format_summary(summary: &PortfolioSummary) -> String {
    let counts: Vec<String> = summary.by_class.iter().map(|(class, n)| format!("{class}={n}")).collect();
    format!(
        "Tickers: {} | {} | avg confidence {:.2} | low confidence {}\n",
        summary.total,
        counts.join(" "),
        summary.average_confidence,
        summary.low_confidence
    )
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn fmt_alloc(a: &Allocation) -> String {
    format!("{:>6.1} {:>6.1} {:>6.1} {:>6.1}", a.a, a.b, a.c, a.d)
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(v) if v.abs() >= 1e4 => format!("{v:.0}"),
        Some(v) => format!("{v:.2}"),
        None => "-".to_string(),
    }
}

fn fmt_unit(v: Option<i8>) -> String {
    match v {
        Some(v) => format!("{v:+}"),
        None => "-".to_string(),
    }
}

fn band_label(band: Band) -> String {
    band.to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
