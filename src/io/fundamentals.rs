//! Fundamentals CSV ingest.
//!
//! Expected columns (header names are case-insensitive; only `ticker` is
//! required):
//!
//! ```text
//! ticker,revenue_growth,eps_growth,pe_forward,debt_ebitda,eps,ebitda,pe_available
//! ```
//!
//! Growth figures are percentages. Empty numeric cells are missing values.
//! `pe_available` accepts true/false, yes/no or 1/0; when the column is absent
//! it is inferred from whether `pe_forward` is present.

use std::collections::HashMap;
use std::path::Path;

use csv::StringRecord;

use crate::data::MemoryFundamentals;
use crate::domain::{Fundamentals, Ticker};
use crate::error::AppError;

/// Tickers in file order plus the provider holding their fundamentals.
#[derive(Debug, Clone, Default)]
pub struct FundamentalsFile {
    pub tickers: Vec<Ticker>,
    pub provider: MemoryFundamentals,
}

pub fn load_fundamentals(path: &Path) -> Result<FundamentalsFile, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| AppError::io(format!("Failed to open fundamentals '{}': {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::io(format!("Failed to read fundamentals headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    if !header_map.contains_key("ticker") {
        return Err(AppError::data("Fundamentals CSV needs a `ticker` column."));
    }

    let mut out = FundamentalsFile::default();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_row(&record, &header_map));
        match parsed {
            Ok((ticker, fundamentals)) => {
                if out.tickers.contains(&ticker) {
                    tracing::warn!(line, %ticker, "duplicate ticker; later row wins");
                } else {
                    out.tickers.push(ticker.clone());
                }
                out.provider.insert(ticker, fundamentals);
            }
            Err(message) => tracing::warn!(line, %message, "skipping fundamentals row"),
        }
    }

    if out.tickers.is_empty() {
        return Err(AppError::data(format!("No valid rows in '{}'.", path.display())));
    }
    tracing::info!(path = %path.display(), tickers = out.tickers.len(), "loaded fundamentals");
    Ok(out)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase(), idx))
        .collect()
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<(Ticker, Fundamentals), String> {
    let raw_ticker = get_optional(record, header_map, "ticker").ok_or("Missing ticker")?;
    let ticker = Ticker::parse(raw_ticker).map_err(|e| e.to_string())?;

    let num = |name: &str| get_optional(record, header_map, name).and_then(parse_opt_f64);
    let pe_forward = num("pe_forward");
    let pe_available = match get_optional(record, header_map, "pe_available") {
        Some(flag) => parse_flag(flag)?,
        None => pe_forward.is_some(),
    };
    let eps = num("eps");
    let ebitda = num("ebitda");

    let fundamentals = Fundamentals {
        revenue_growth: num("revenue_growth"),
        eps_growth: num("eps_growth"),
        pe_forward,
        debt_ebitda: num("debt_ebitda"),
        eps,
        ebitda,
        eps_positive: eps.map(|v| v > 0.0),
        ebitda_positive: ebitda.map(|v| v > 0.0),
        pe_available,
    };
    Ok((ticker, fundamentals))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: &str) -> Option<f64> {
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

fn parse_flag(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        other => Err(format!("Invalid pe_available flag '{other}'")),
    }
}
