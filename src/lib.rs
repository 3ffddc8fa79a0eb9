//! `liquidity-regime` library crate.
//!
//! Classifies the monetary-liquidity regime from Fed data, scores macro
//! indicators into a Fed Pressure Score and a Growth Pulse Score, turns those
//! into a four-class equity allocation, and classifies individual stocks into
//! the same classes from their fundamentals.
//!
//! The binary (`lr`) is a thin wrapper around this library; every engine
//! function takes its tables explicitly and can be tested without I/O.

pub mod allocation;
pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod io;
pub mod logging;
pub mod math;
pub mod regime;
pub mod report;
pub mod scores;
pub mod smoothing;
pub mod stocks;
