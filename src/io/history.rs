//! CSV persistence for the macro history.
//!
//! One row per date:
//!
//! ```text
//! date, <raw field columns>, <indicator>_ma ..., <yoy columns>
//! ```
//!
//! Empty cells are missing values. Unknown columns are ignored on load, so a
//! file written by a newer build still loads. Saves go to a temporary sibling
//! file that is renamed over the target, so readers never see a half-written
//! history.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;

use crate::data::{MacroReader, MacroWriter, MemoryMacroStore};
use crate::domain::{DerivedPoint, Indicator, MacroField, MacroPoint};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    Raw(MacroField),
    Smoothed(Indicator),
    Yoy(Indicator),
}

fn smoothed_column(indicator: Indicator) -> String {
    format!("{}_ma", indicator.key())
}

fn yoy_column(indicator: Indicator) -> String {
    let key = indicator.key();
    if key.ends_with("_yoy") { key.to_string() } else { format!("{key}_yoy") }
}

fn resolve_column(name: &str) -> Option<Column> {
    let name = name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase();
    if name == "date" {
        return Some(Column::Date);
    }
    if let Some(field) = MacroField::from_column(&name) {
        return Some(Column::Raw(field));
    }
    Indicator::ALL.into_iter().find_map(|indicator| {
        if name == smoothed_column(indicator) {
            Some(Column::Smoothed(indicator))
        } else if name == yoy_column(indicator) {
            Some(Column::Yoy(indicator))
        } else {
            None
        }
    })
}

/// Load a history file. A missing file is an empty history.
///
/// Rows with an unreadable date are skipped with a warning; a cell that does
/// not parse as a number is treated as missing.
pub fn load_history(path: &Path) -> Result<MemoryMacroStore, AppError> {
    let mut store = MemoryMacroStore::new();
    if !path.exists() {
        tracing::info!(path = %path.display(), "no history file yet; starting empty");
        return Ok(store);
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| AppError::io(format!("Failed to open history '{}': {e}", path.display())))?;

    let headers = reader.headers().map_err(|e| AppError::io(format!("Failed to read history headers: {e}")))?.clone();
    let columns: Vec<Option<Column>> = headers.iter().map(resolve_column).collect();
    if !columns.contains(&Some(Column::Date)) {
        return Err(AppError::data(format!("History '{}' has no `date` column.", path.display())));
    }

    let mut raw = Vec::new();
    let mut derived = Vec::new();
    let mut skipped = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(line, error = %e, "skipping unreadable history row");
                skipped += 1;
                continue;
            }
        };
        match parse_row(&record, &columns) {
            Ok((point, row)) => {
                raw.push(point);
                if let Some(row) = row {
                    derived.push(row);
                }
            }
            Err(message) => {
                tracing::warn!(line, %message, "skipping history row");
                skipped += 1;
            }
        }
    }

    store.upsert_raw(&raw)?;
    store.upsert_derived(&derived)?;
    tracing::info!(path = %path.display(), dates = store.len(), derived = derived.len(), skipped, "loaded history");
    Ok(store)
}

fn parse_row(record: &StringRecord, columns: &[Option<Column>]) -> Result<(MacroPoint, Option<DerivedPoint>), String> {
    let mut date = None;
    let mut cells = Vec::new();
    for (cell, column) in record.iter().zip(columns) {
        match column {
            Some(Column::Date) => date = Some(parse_date(cell)?),
            Some(column) => {
                if let Some(value) = parse_opt_f64(cell) {
                    cells.push((*column, value));
                }
            }
            None => {}
        }
    }
    let date = date.ok_or_else(|| "Missing date".to_string())?;

    let mut point = MacroPoint::new(date);
    let mut row = DerivedPoint::new(date);
    for (column, value) in cells {
        match column {
            Column::Raw(field) => point.set(field, value),
            Column::Smoothed(indicator) => {
                row.smoothed.insert(indicator, value);
            }
            Column::Yoy(indicator) => {
                row.yoy.insert(indicator, value);
            }
            Column::Date => {}
        }
    }

    let has_derived = !(row.smoothed.is_empty() && row.yoy.is_empty());
    Ok((point, has_derived.then_some(row)))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| format!("Invalid date '{s}' (expected YYYY-MM-DD)"))
}

fn parse_opt_f64(s: &str) -> Option<f64> {
    let v = s.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// Write the whole history atomically (temp file + rename).
pub fn save_history(path: &Path, store: &MemoryMacroStore) -> Result<usize, AppError> {
    let raw = store.read_all()?;
    let yoy_indicators: BTreeSet<Indicator> = store
        .read_derived()?
        .iter()
        .flat_map(|row| row.yoy.keys().copied())
        .collect();

    let mut header = vec!["date".to_string()];
    header.extend(MacroField::ALL.iter().map(|f| f.column().to_string()));
    header.extend(Indicator::ALL.iter().map(|i| smoothed_column(*i)));
    header.extend(yoy_indicators.iter().map(|i| yoy_column(*i)));

    let tmp = temp_path(path);
    let write = || -> Result<(), AppError> {
        let mut writer = csv::Writer::from_path(&tmp)
            .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", tmp.display())))?;
        writer.write_record(&header).map_err(|e| AppError::io(format!("Failed to write history header: {e}")))?;

        for point in &raw {
            let derived = store.derived_for(point.date);
            let mut record = vec![point.date.to_string()];
            record.extend(MacroField::ALL.iter().map(|f| fmt_cell(point.get(*f))));
            record.extend(Indicator::ALL.iter().map(|i| fmt_cell(derived.and_then(|row| row.smoothed(*i)))));
            record.extend(yoy_indicators.iter().map(|i| fmt_cell(derived.and_then(|row| row.yoy.get(i).copied()))));
            writer
                .write_record(&record)
                .map_err(|e| AppError::io(format!("Failed to write history row {}: {e}", point.date)))?;
        }

        writer.flush().map_err(|e| AppError::io(format!("Failed to flush '{}': {e}", tmp.display())))
    };

    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| AppError::io(format!("Failed to replace '{}': {e}", path.display())))?;

    tracing::info!(path = %path.display(), rows = raw.len(), "saved history");
    Ok(raw.len())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn fmt_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
