// In crates/core-types/src/lib.rs

pub mod book;
pub mod error;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use book::{MAX_POSITIONS, PositionBook};
pub use error::{Error, Result};
pub use types::{DailySnapshot, PortfolioSummary, Position, PositionChange, Symbol};
