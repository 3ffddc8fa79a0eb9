//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module parses the CLI, installs logging,
//! loads the engine tables and dispatches to one handler per command.

use chrono::{Duration, Local, NaiveDate};
use clap::Parser;
use serde::Serialize;

use crate::allocation::AllocationEngine;
use crate::cli::{AllocateArgs, ClassifyArgs, Cli, Command, FetchArgs, HistoryArgs, ReportArgs};
use crate::config::EngineConfig;
use crate::data::{FredClient, MacroWriter};
use crate::error::AppError;
use crate::io::{load_fundamentals, load_history, save_history};
use crate::report::format::{format_allocation, format_classifications, format_report, format_summary};
use crate::smoothing::refresh_store;
use crate::stocks::{PortfolioSummary, classify_portfolio, filter_records};

pub mod pipeline;

/// Entry point for the `lr` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    crate::logging::init(cli.verbose);

    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Fetch(args) => handle_fetch(&args),
        Command::Smooth(args) => handle_smooth(&args, &config),
        Command::Report(args) => handle_report(&args, &config),
        Command::Allocate(args) => handle_allocate(&args, &config),
        Command::Classify(args) => handle_classify(&args, &config),
        Command::Config => print_json(&config),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn handle_fetch(args: &FetchArgs) -> Result<(), AppError> {
    let path = &args.history.history;
    let end = today();
    let start = end - Duration::days(i64::from(args.days));

    let client = FredClient::from_env()?;
    let points = client.fetch_history(start, end)?;

    let mut store = load_history(path)?;
    let upserted = store.upsert_raw(&points)?;
    let rows = save_history(path, &store)?;

    match store.latest_date() {
        Some(latest) => {
            println!("Fetched {upserted} dates ({start} to {end}); history now has {rows} rows through {latest}.")
        }
        None => println!("Fetched nothing for {start} to {end}; history is still empty."),
    }
    Ok(())
}

fn handle_smooth(args: &HistoryArgs, config: &EngineConfig) -> Result<(), AppError> {
    let path = args.history.as_path();
    let mut store = load_history(path)?;
    let written = refresh_store(&mut store, config)?;
    save_history(path, &store)?;

    println!("Smoothed {written} rows in {}.", path.display());
    Ok(())
}

fn handle_report(args: &ReportArgs, config: &EngineConfig) -> Result<(), AppError> {
    let report = pipeline::build_from_history(&args.history.history, config)?;
    if args.json {
        return print_json(&report);
    }
    print!("{}", format_report(&report));
    Ok(())
}

fn handle_allocate(args: &AllocateArgs, config: &EngineConfig) -> Result<(), AppError> {
    check_score("fps", args.fps)?;
    check_score("gps", args.gps)?;

    let result = AllocationEngine::new(&config.allocation).calculate(args.regime, args.fps, args.gps);
    if args.json {
        return print_json(&result);
    }
    print!("{}", format_allocation(&result));
    Ok(())
}

fn check_score(name: &str, value: f64) -> Result<(), AppError> {
    if value.is_finite() && (-1.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AppError::config(format!("--{name} must be in [-1, 1], got {value}")))
    }
}

#[derive(Serialize)]
struct ClassifyOutput<'a> {
    records: &'a [crate::domain::ClassificationRecord],
    summary: &'a PortfolioSummary,
}

fn handle_classify(args: &ClassifyArgs, config: &EngineConfig) -> Result<(), AppError> {
    let file = load_fundamentals(&args.fundamentals)?;
    let as_of = args.date.unwrap_or_else(today);

    let all = classify_portfolio(&file.provider, &file.tickers, &config.class_targets, as_of)?;
    let summary = PortfolioSummary::from_records(&all, &config.confidence_tiers);
    // The summary covers the whole file; filters only narrow the listing.
    let records = filter_records(&all, args.class, args.min_confidence);

    if args.json {
        return print_json(&ClassifyOutput { records: &records, summary: &summary });
    }
    print!("{}", format_classifications(&records, &config.confidence_tiers));
    print!("{}", format_summary(&summary));
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::data(format!("Failed to serialize output: {e}")))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_flags_are_bounded() {
        assert!(check_score("fps", 0.4).is_ok());
        assert!(check_score("fps", -1.0).is_ok());
        assert_eq!(check_score("gps", 1.5).unwrap_err().exit_code(), 2);
        assert!(check_score("gps", f64::NAN).is_err());
    }

    #[test]
    fn smooth_writes_derived_columns_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(&path, "date,unrate\n2024-01-01,3.7\n2024-02-01,3.9\n2024-03-01,3.8\n").unwrap();

        let args = HistoryArgs { history: path.clone() };
        handle_smooth(&args, &EngineConfig::default()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().next().unwrap().contains("unemployment_ma"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn smooth_on_missing_history_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = HistoryArgs { history: dir.path().join("none.csv") };
        assert_eq!(handle_smooth(&args, &EngineConfig::default()).unwrap_err().exit_code(), 4);
    }
}
