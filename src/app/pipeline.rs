//! Shared report pipeline used by `lr report`.
//!
//! history file -> in-memory smoothing -> regime + scores + allocation
//!
//! Smoothing here never touches the file; `lr smooth` is the command that
//! persists derived columns.

use std::path::Path;

use crate::config::EngineConfig;
use crate::data::{MacroReader, MemoryMacroStore};
use crate::error::AppError;
use crate::io::load_history;
use crate::report::{RegimeReport, build_report};
use crate::smoothing::update_moving_averages;

/// Load the history file and build a report from it.
pub fn build_from_history(path: &Path, config: &EngineConfig) -> Result<RegimeReport, AppError> {
    let store = load_history(path)?;
    build_from_store(&store, config)
}

/// Build a report from a loaded store, recomputing derived rows from raw data.
pub fn build_from_store(store: &MemoryMacroStore, config: &EngineConfig) -> Result<RegimeReport, AppError> {
    let raw = store.read_all()?;
    if raw.is_empty() {
        return Err(AppError::data("History is empty; run `lr fetch` first."));
    }

    let derived = update_moving_averages(&raw, config);
    build_report(&raw, &derived, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MacroWriter;
    use crate::domain::{MacroField, MacroPoint, Regime};
    use chrono::{Duration, NaiveDate};

    #[test]
    fn empty_history_is_a_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_from_history(&dir.path().join("missing.csv"), &EngineConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn report_ignores_stale_derived_rows_in_the_store() {
        let end = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        let raw: Vec<MacroPoint> = (0..60)
            .map(|i| {
                MacroPoint::new(end - Duration::weeks(59 - i))
                    .with(MacroField::FedFunds, 3.0 + 0.05 * i as f64)
                    .with(MacroField::BalanceSheet, 8.0e12 - 1.0e10 * i as f64)
                    .with(MacroField::Unemployment, 4.0)
            })
            .collect();
        let mut store = MemoryMacroStore::new();
        store.upsert_raw(&raw).unwrap();

        let report = build_from_store(&store, &EngineConfig::default()).unwrap();
        assert_eq!(report.regime.regime, Regime::LeastLiquid);
        assert_eq!(report.as_of, end);
        assert_eq!(report.allocation.allocation.total_tenths(), 1000);
    }
}
