// In crates/ledger/src/memory.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{DailySnapshot, Error, Position, PositionChange, Result, Symbol};
use rust_decimal::Decimal;

use crate::{AccountCash, LedgerStore, PriceOracle, TradeCommit};

#[derive(Default)]
struct StoreInner {
    account: Option<AccountCash>,
    positions: HashMap<Symbol, Position>,
    snapshots: BTreeMap<NaiveDate, DailySnapshot>,
}

/// `LedgerStore` backed by plain maps behind a mutex.
///
/// Same contract as the PostgreSQL store, including the version check in
/// `commit_trade`, so engine behavior under contention and write failure
/// can be exercised without a database.
#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: Mutex<StoreInner>,
    fail_writes: AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every subsequent write fails with a store error,
    /// simulating a persistence outage mid-session.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The stored account row, if any.
    pub fn account(&self) -> Option<AccountCash> {
        self.inner.lock().unwrap().account
    }

    /// The stored position for `symbol`, if any.
    pub fn position_for(&self, symbol: &Symbol) -> Option<Position> {
        self.inner.lock().unwrap().positions.get(symbol).cloned()
    }

    /// The stored snapshot for `date`, if any.
    pub fn snapshot_for(&self, date: NaiveDate) -> Option<DailySnapshot> {
        self.inner.lock().unwrap().snapshots.get(&date).cloned()
    }

    /// Number of stored snapshots, one per distinct date.
    pub fn snapshot_count(&self) -> usize {
        self.inner.lock().unwrap().snapshots.len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Store {
                reason: "simulated write failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn load_positions(&self) -> Result<HashMap<Symbol, Position>> {
        Ok(self.inner.lock().unwrap().positions.clone())
    }

    async fn load_latest_cash(&self) -> Result<Option<AccountCash>> {
        Ok(self.inner.lock().unwrap().account)
    }

    async fn upsert_position(&self, position: &Position) -> Result<()> {
        self.check_writable()?;
        self.inner
            .lock()
            .unwrap()
            .positions
            .insert(position.symbol.clone(), position.clone());
        Ok(())
    }

    async fn delete_position(&self, symbol: &Symbol) -> Result<()> {
        self.check_writable()?;
        self.inner.lock().unwrap().positions.remove(symbol);
        Ok(())
    }

    async fn upsert_snapshot(&self, snapshot: &DailySnapshot) -> Result<()> {
        self.check_writable()?;
        self.inner
            .lock()
            .unwrap()
            .snapshots
            .insert(snapshot.date, snapshot.clone());
        Ok(())
    }

    async fn recent_snapshots(&self, limit: u32) -> Result<Vec<DailySnapshot>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .snapshots
            .values()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn commit_trade(&self, commit: &TradeCommit) -> Result<i64> {
        self.check_writable()?;
        let mut inner = self.inner.lock().unwrap();
        let current = inner.account.map(|account| account.version);
        if current != commit.expected_version {
            return Err(Error::StoreConflict);
        }
        let new_version = commit.expected_version.unwrap_or(0) + 1;
        inner.account = Some(AccountCash {
            cash: commit.cash,
            version: new_version,
        });
        match &commit.position {
            PositionChange::Upsert(position) => {
                inner
                    .positions
                    .insert(position.symbol.clone(), position.clone());
            }
            PositionChange::Remove(symbol) => {
                inner.positions.remove(symbol);
            }
        }
        inner
            .snapshots
            .insert(commit.snapshot.date, commit.snapshot.clone());
        Ok(new_version)
    }
}

/// `PriceOracle` over a settable in-memory price table.
#[derive(Default)]
pub struct MemoryPriceOracle {
    prices: Mutex<HashMap<Symbol, Decimal>>,
}

impl MemoryPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or replaces the latest price for `symbol`.
    pub fn set_price(&self, symbol: &Symbol, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.clone(), price);
    }

    /// Forgets the price for `symbol`, as if it had never traded.
    pub fn clear_price(&self, symbol: &Symbol) {
        self.prices.lock().unwrap().remove(symbol);
    }
}

#[async_trait]
impl PriceOracle for MemoryPriceOracle {
    async fn get_latest_price(&self, symbol: &Symbol) -> Result<Decimal> {
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::PriceUnavailable {
                symbol: symbol.0.clone(),
            })
    }
}
