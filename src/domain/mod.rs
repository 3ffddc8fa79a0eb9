//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - raw and derived macro history rows (`MacroPoint`, `DerivedPoint`)
//! - indicator classification and sentiment outputs (`ClassifiedIndicator`, `SentimentScore`)
//! - regime and allocation outputs (`RegimeAssessment`, `AllocationResult`)
//! - per-ticker fundamentals and classifications (`Fundamentals`, `Classification`)

pub mod types;

pub use types::*;
