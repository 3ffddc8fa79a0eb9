//! FRED API integration for the macro history.
//!
//! One request per series. Observations are converted to the units the
//! scoring tables expect (see `FRED_SERIES`) and merged into one
//! `MacroPoint` per date.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::{MacroField, MacroPoint};
use crate::error::AppError;

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";
const OBS_LIMIT: usize = 100000;

/// A FRED series and how its observations map onto a macro field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSpec {
    pub id: &'static str,
    pub field: MacroField,
    /// FRED `units` transformation (`pch` = percent change, `chg` = change).
    pub units: Option<&'static str>,
    /// Multiplier applied after parsing.
    pub scale: f64,
}

const fn series(id: &'static str, field: MacroField, units: Option<&'static str>, scale: f64) -> SeriesSpec {
    SeriesSpec { id, field, units, scale }
}

pub const FRED_SERIES: [SeriesSpec; 13] = [
    // Millions of dollars -> dollars.
    series("WALCL", MacroField::BalanceSheet, None, 1e6),
    series("DFF", MacroField::FedFunds, None, 1.0),
    series("T10Y2Y", MacroField::YieldSpread, None, 1.0),
    series("UNRATE", MacroField::Unemployment, None, 1.0),
    series("ICSA", MacroField::JoblessClaims, None, 1.0),
    // Monthly change in thousands of persons -> persons.
    series("PAYEMS", MacroField::NonfarmPayrolls, Some("chg"), 1e3),
    series("CPIAUCSL", MacroField::Cpi, None, 1.0),
    series("CPILFESL", MacroField::CoreCpi, None, 1.0),
    series("PPIACO", MacroField::Ppi, Some("pch"), 1.0),
    series("CFNAI", MacroField::Cfnai, None, 1.0),
    series("INDPRO", MacroField::IndustrialProduction, Some("pch"), 1.0),
    series("RSAFS", MacroField::RetailSales, Some("pch"), 1.0),
    series("UMCSENT", MacroField::ConsumerSentiment, None, 1.0),
];

pub struct FredClient {
    client: Client,
    api_key: String,
}

impl FredClient {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("FRED_API_KEY")
            .map_err(|_| AppError::config("Missing FRED_API_KEY in environment (.env)."))?;
        Ok(Self { client: Client::new(), api_key })
    }

    /// Fetch every configured series over `[start, end]` and merge by date.
    ///
    /// A series that returns no observations in the window is logged and
    /// skipped; a failed request aborts the fetch.
    pub fn fetch_history(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<MacroPoint>, AppError> {
        let mut fetched = Vec::with_capacity(FRED_SERIES.len());
        for spec in &FRED_SERIES {
            let obs = self.fetch_series(spec, start, end)?;
            if obs.is_empty() {
                tracing::warn!(series = spec.id, %start, %end, "no observations returned");
            } else {
                tracing::debug!(series = spec.id, observations = obs.len(), "fetched series");
            }
            fetched.push((spec.field, obs));
        }

        let points = merge_series(&fetched);
        tracing::info!(series = fetched.len(), dates = points.len(), %start, %end, "fetched FRED history");
        Ok(points)
    }

    fn fetch_series(
        &self,
        spec: &SeriesSpec,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, AppError> {
        let limit = OBS_LIMIT.to_string();
        let start = start.to_string();
        let end = end.to_string();
        let mut req = self.client.get(BASE_URL).query(&[
            ("series_id", spec.id),
            ("api_key", self.api_key.as_str()),
            ("file_type", "json"),
            ("sort_order", "asc"),
            ("limit", limit.as_str()),
            ("observation_start", start.as_str()),
            ("observation_end", end.as_str()),
        ]);
        if let Some(units) = spec.units {
            req = req.query(&[("units", units)]);
        }

        let resp = req.send().map_err(|e| AppError::data(format!("FRED request for {} failed: {e}", spec.id)))?;

        if !resp.status().is_success() {
            return Err(AppError::data(format!("FRED request for {} failed with status {}.", spec.id, resp.status())));
        }

        let body: ObservationsResponse = resp
            .json()
            .map_err(|e| AppError::data(format!("Failed to parse FRED response for {}: {e}", spec.id)))?;

        parse_observations(&body.observations, spec.scale)
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

fn parse_observations(observations: &[Observation], scale: f64) -> Result<Vec<(NaiveDate, f64)>, AppError> {
    let mut out = Vec::with_capacity(observations.len());
    for obs in observations {
        let Some(value) = parse_value(&obs.value) else {
            continue;
        };
        let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d")
            .map_err(|e| AppError::data(format!("Invalid FRED date '{}': {e}", obs.date)))?;
        out.push((date, value * scale));
    }
    Ok(out)
}

/// FRED marks missing observations with ".".
fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed == "." || trimmed.is_empty() {
        return None;
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// One point per date carrying every field observed on it, oldest first.
pub fn merge_series(series: &[(MacroField, Vec<(NaiveDate, f64)>)]) -> Vec<MacroPoint> {
    let mut by_date: BTreeMap<NaiveDate, MacroPoint> = BTreeMap::new();
    for (field, obs) in series {
        for &(date, value) in obs {
            by_date.entry(date).or_insert_with(|| MacroPoint::new(date)).set(*field, value);
        }
    }
    by_date.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parse_value_handles_missing_markers() {
        assert_eq!(parse_value("."), None);
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value(" 5.33 "), Some(5.33));
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value("abc"), None);
    }

    #[test]
    fn observations_are_scaled_and_gaps_skipped() {
        let raw: ObservationsResponse = serde_json::from_str(
            r#"{"observations":[
                {"date":"2024-01-03","value":"7713523"},
                {"date":"2024-01-10","value":"."},
                {"date":"2024-01-17","value":"7677170"}
            ]}"#,
        )
        .unwrap();
        let obs = parse_observations(&raw.observations, 1e6).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].0, d(2024, 1, 3));
        assert!((obs[0].1 - 7.713523e12).abs() < 1.0);
    }

    #[test]
    fn bad_date_is_a_data_error() {
        let obs = vec![Observation { date: "01/03/2024".to_string(), value: "1.0".to_string() }];
        assert_eq!(parse_observations(&obs, 1.0).unwrap_err().exit_code(), 4);
    }

    #[test]
    fn merge_groups_fields_by_date() {
        let merged = merge_series(&[
            (MacroField::FedFunds, vec![(d(2024, 1, 3), 5.33), (d(2024, 1, 4), 5.33)]),
            (MacroField::BalanceSheet, vec![(d(2024, 1, 3), 7.7e12)]),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].date, d(2024, 1, 3));
        assert_eq!(merged[0].get(MacroField::BalanceSheet), Some(7.7e12));
        assert_eq!(merged[1].get(MacroField::BalanceSheet), None);
    }

    #[test]
    fn every_field_has_one_series() {
        for field in MacroField::ALL {
            assert_eq!(FRED_SERIES.iter().filter(|s| s.field == field).count(), 1, "{field:?}");
        }
    }
}
