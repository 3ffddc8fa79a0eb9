//! File input/output.
//!
//! - macro history CSV load/save (`history`)
//! - fundamentals CSV ingest (`fundamentals`)

pub mod fundamentals;
pub mod history;

pub use fundamentals::*;
pub use history::*;
