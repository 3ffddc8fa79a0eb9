//! Numeric primitives: triangular closeness and small rounding/averaging helpers.

pub mod closeness;
pub mod stats;

pub use closeness::*;
pub use stats::*;
