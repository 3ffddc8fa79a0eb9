//! Collaborator seams for macro history and fundamentals.
//!
//! The scoring core never talks to a database or a network. It reads history
//! through `MacroReader`, writes derived rows back through `MacroWriter`, and
//! asks a `FundamentalsProvider` for per-ticker data. `MemoryMacroStore` is the
//! in-process implementation used by the CLI (backed by the CSV history file)
//! and by tests.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{DerivedPoint, Fundamentals, MacroPoint, Ticker};
use crate::error::AppError;

pub trait MacroReader {
    /// Raw points with `start <= date <= end` (open bounds when `None`), oldest first.
    fn read_range(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Vec<MacroPoint>, AppError>;

    /// All derived rows, oldest first.
    fn read_derived(&self) -> Result<Vec<DerivedPoint>, AppError>;

    fn read_all(&self) -> Result<Vec<MacroPoint>, AppError> {
        self.read_range(None, None)
    }
}

pub trait MacroWriter {
    /// Idempotent upsert of raw points; fields present in a point overwrite the
    /// stored ones for that date, other fields are kept. Returns rows touched.
    fn upsert_raw(&mut self, points: &[MacroPoint]) -> Result<usize, AppError>;

    /// Replace the derived row of each date wholesale. Returns rows written.
    fn upsert_derived(&mut self, rows: &[DerivedPoint]) -> Result<usize, AppError>;
}

pub trait FundamentalsProvider {
    fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals, AppError>;
}

/// Date-keyed in-memory history.
#[derive(Debug, Clone, Default)]
pub struct MemoryMacroStore {
    raw: BTreeMap<NaiveDate, MacroPoint>,
    derived: BTreeMap<NaiveDate, DerivedPoint>,
}

impl MemoryMacroStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.raw.keys().next_back().copied()
    }

    pub fn derived_for(&self, date: NaiveDate) -> Option<&DerivedPoint> {
        self.derived.get(&date)
    }
}

impl MacroReader for MemoryMacroStore {
    fn read_range(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Vec<MacroPoint>, AppError> {
        let start = start.unwrap_or(NaiveDate::MIN);
        let end = end.unwrap_or(NaiveDate::MAX);
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self.raw.range(start..=end).map(|(_, p)| p.clone()).collect())
    }

    fn read_derived(&self) -> Result<Vec<DerivedPoint>, AppError> {
        Ok(self.derived.values().cloned().collect())
    }
}

impl MacroWriter for MemoryMacroStore {
    fn upsert_raw(&mut self, points: &[MacroPoint]) -> Result<usize, AppError> {
        for point in points {
            self.raw
                .entry(point.date)
                .and_modify(|existing| existing.values.extend(point.values.iter().map(|(k, v)| (*k, *v))))
                .or_insert_with(|| point.clone());
        }
        Ok(points.len())
    }

    fn upsert_derived(&mut self, rows: &[DerivedPoint]) -> Result<usize, AppError> {
        for row in rows {
            self.derived.insert(row.date, row.clone());
        }
        Ok(rows.len())
    }
}

/// Fundamentals held in memory, keyed by ticker.
#[derive(Debug, Clone, Default)]
pub struct MemoryFundamentals {
    rows: BTreeMap<Ticker, Fundamentals>,
}

impl MemoryFundamentals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: Ticker, fundamentals: Fundamentals) {
        self.rows.insert(ticker, fundamentals);
    }
}

impl FundamentalsProvider for MemoryFundamentals {
    fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals, AppError> {
        self.rows.get(ticker).cloned().ok_or_else(|| AppError::data(format!("No fundamentals for {ticker}.")))
    }
}
