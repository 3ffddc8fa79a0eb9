//! Data collaborators: the store traits and their in-memory implementations,
//! and the FRED client that fills the macro history.

pub mod fred;
pub mod store;

pub use fred::FredClient;
pub use store::*;
