// In crates/ledger/src/lib.rs

use std::collections::HashMap;

use async_trait::async_trait;
use core_types::{DailySnapshot, Position, PositionChange, Result, Symbol};
use rust_decimal::Decimal;

pub mod engine;
pub mod memory;

// Re-export the engine so callers only need `ledger::LedgerEngine`.
pub use engine::LedgerEngine;

/// How many times a trade is attempted before a version conflict is
/// reported to the caller. Each retry re-hydrates from the store first.
pub const TRADE_ATTEMPTS: u32 = 3;

/// Cash balance and optimistic-concurrency version of the singleton
/// account row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountCash {
    pub cash: Decimal,
    pub version: i64,
}

/// Everything one trade needs persisted, bundled into a single unit so the
/// store can write it atomically.
#[derive(Debug, Clone)]
pub struct TradeCommit {
    /// Account version this session last observed. `None` when no account
    /// row exists yet; the commit then creates it.
    pub expected_version: Option<i64>,
    /// Cash balance after the trade.
    pub cash: Decimal,
    /// Position row to write or remove as a result of the trade.
    pub position: PositionChange,
    /// Snapshot of the post-trade portfolio for today's date.
    pub snapshot: DailySnapshot,
}

/// Source of the latest known price per symbol.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Returns the most recent recorded price for `symbol`, or
    /// `Error::PriceUnavailable` when the symbol has no price history.
    async fn get_latest_price(&self, symbol: &Symbol) -> Result<Decimal>;
}

/// Durable storage for positions, account cash and daily P&L snapshots.
///
/// `commit_trade` is the only compound write: it must persist the position
/// change, the new cash balance and the snapshot as one atomic unit, and it
/// must refuse the write with `Error::StoreConflict` when the account
/// version no longer matches `expected_version`. That check is what turns
/// two racing sessions into one winner and one retry instead of a silently
/// lost update.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// All open positions, keyed by symbol.
    async fn load_positions(&self) -> Result<HashMap<Symbol, Position>>;

    /// Current cash and version, or `None` when no account row exists yet.
    async fn load_latest_cash(&self) -> Result<Option<AccountCash>>;

    /// Inserts or replaces the position row for `position.symbol`.
    async fn upsert_position(&self, position: &Position) -> Result<()>;

    /// Removes the position row for `symbol`, if present.
    async fn delete_position(&self, symbol: &Symbol) -> Result<()>;

    /// Inserts the snapshot, replacing any prior row for the same date.
    async fn upsert_snapshot(&self, snapshot: &DailySnapshot) -> Result<()>;

    /// Stored snapshots, most recent date first, at most `limit` of them.
    async fn recent_snapshots(&self, limit: u32) -> Result<Vec<DailySnapshot>>;

    /// Atomically persists one trade and returns the new account version.
    async fn commit_trade(&self, commit: &TradeCommit) -> Result<i64>;
}
