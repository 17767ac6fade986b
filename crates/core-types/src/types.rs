// In crates/core-types/src/types.rs

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A trading symbol, e.g. "AAPL".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

/// A currently held quantity of one symbol at its cost-weighted average
/// purchase price.
///
/// A position exists only while `quantity > 0`; selling a position down to
/// zero removes it entirely, it is never stored as a zero-quantity row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: Decimal,
    pub avg_price: Decimal,
}

/// The persistence effect of one trade on the positions table: either the
/// surviving position to upsert, or the symbol whose row must go.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionChange {
    Upsert(Position),
    Remove(Symbol),
}

/// One persisted mark-to-market record per calendar date (UTC).
/// Writing a snapshot for an existing date replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub cash: Decimal,
    pub unrealized_pnl: Decimal,
    pub total: Decimal,
}

/// Derived view of the account returned by every trade and summary call.
/// Never persisted directly; it is the payload a `DailySnapshot` is built from.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub cash: Decimal,
    pub holdings: HashMap<Symbol, Position>,
    pub unrealized_pnl: Decimal,
    pub total: Decimal,
}
