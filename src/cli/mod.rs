//! Command-line parsing for the liquidity regime engine.
//!
//! Parsing and dispatch stay apart from the scoring code; `app` turns a
//! parsed `Cli` into calls on the library.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{Regime, StockClass};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "lr", version, about = "Liquidity regime classifier and allocation engine (FRED-based)")]
pub struct Cli {
    /// JSON file overriding the default engine tables.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch FRED series and merge them into the history file.
    Fetch(FetchArgs),
    /// Recompute moving averages and year-over-year columns in the history file.
    Smooth(HistoryArgs),
    /// Classify the regime, score the indicators and print the allocation.
    Report(ReportArgs),
    /// Run the allocation engine for a given regime and scores.
    Allocate(AllocateArgs),
    /// Classify every ticker in a fundamentals CSV.
    Classify(ClassifyArgs),
    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Debug, Args, Clone)]
pub struct HistoryArgs {
    /// History CSV (created on first fetch).
    #[arg(long, default_value = "history.csv")]
    pub history: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct FetchArgs {
    #[command(flatten)]
    pub history: HistoryArgs,

    /// Calendar days of history to request, ending today.
    #[arg(long, default_value_t = 800)]
    pub days: u32,
}

#[derive(Debug, Args, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub history: HistoryArgs,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct AllocateArgs {
    /// Regime: most-liquid, prefer-c, prefer-b, least-liquid (or the full label).
    #[arg(short, long)]
    pub regime: Regime,

    /// Fed Pressure Score in [-1, 1].
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub fps: f64,

    /// Growth Pulse Score in [-1, 1].
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub gps: f64,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ClassifyArgs {
    /// Fundamentals CSV with a `ticker` column.
    #[arg(short, long)]
    pub fundamentals: PathBuf,

    /// Classification date recorded on each row (default: today).
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Only list tickers of this class (A, B, C or D).
    #[arg(long)]
    pub class: Option<StockClass>,

    /// Only list tickers whose confidence is at least this (0..=1).
    #[arg(long, value_parser = parse_unit_interval)]
    pub min_confidence: Option<f64>,

    #[arg(long)]
    pub json: bool,
}

fn parse_unit_interval(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("invalid number '{s}'"))?;
    if (0.0..=1.0).contains(&v) { Ok(v) } else { Err(format!("{v} is outside [0, 1]")) }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}
