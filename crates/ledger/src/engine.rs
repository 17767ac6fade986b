// In crates/ledger/src/engine.rs

use std::sync::Arc;

use chrono::Utc;
use core_types::{
    DailySnapshot, Error, MAX_POSITIONS, PortfolioSummary, PositionBook, Result, Symbol,
};
use rust_decimal::Decimal;

use crate::{LedgerStore, PriceOracle, TRADE_ATTEMPTS, TradeCommit};

#[derive(Debug, Clone, Copy)]
enum Side {
    Buy,
    Sell,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// One session over the trading account.
///
/// The engine hydrates a `PositionBook` from the store, validates and
/// prices trades against it, and persists each trade through
/// `LedgerStore::commit_trade` before letting the in-memory book advance.
/// A trade is staged on a copy of the book, so a rejected or failed commit
/// leaves the session exactly where it was.
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    oracle: Arc<dyn PriceOracle>,
    starting_cash: Decimal,
    book: PositionBook,
    /// Account version observed at the last hydrate or commit. `None`
    /// until the account row exists.
    version: Option<i64>,
}

impl LedgerEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<dyn PriceOracle>,
        starting_cash: Decimal,
    ) -> Self {
        Self {
            store,
            oracle,
            starting_cash,
            book: PositionBook::default(),
            version: None,
        }
    }

    /// Builds an engine and hydrates it from the store in one step.
    pub async fn load(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<dyn PriceOracle>,
        starting_cash: Decimal,
    ) -> Result<Self> {
        let mut engine = Self::new(store, oracle, starting_cash);
        engine.hydrate().await?;
        Ok(engine)
    }

    /// Reloads positions and cash from the store, replacing the in-memory
    /// book. A brand-new account starts at the configured starting cash.
    pub async fn hydrate(&mut self) -> Result<()> {
        let positions = self.store.load_positions().await?;
        let (cash, version) = match self.store.load_latest_cash().await? {
            Some(account) => (account.cash, Some(account.version)),
            None => (self.starting_cash, None),
        };
        self.book = PositionBook::new(cash, positions);
        self.version = version;
        tracing::debug!(
            cash = %self.book.cash,
            holdings = self.book.distinct_symbols(),
            "Hydrated position book from the ledger store."
        );
        Ok(())
    }

    /// The in-memory book as of the last hydrate or committed trade.
    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    /// Buys `quantity` shares of `symbol` at the latest oracle price.
    ///
    /// Validation order: positive quantity, position limit, price lookup,
    /// affordability. A trade whose value leaves `Decimal` range is
    /// refused as `InvalidArgument` rather than panicking. On a version
    /// conflict the whole trade is re-run against freshly hydrated state,
    /// up to `TRADE_ATTEMPTS` times.
    pub async fn buy(&mut self, symbol: &Symbol, quantity: Decimal) -> Result<PortfolioSummary> {
        self.trade(symbol, quantity, Side::Buy).await
    }

    /// Sells `quantity` shares of `symbol` at the latest oracle price.
    ///
    /// The remaining position keeps its average price; selling the full
    /// quantity removes the position. Conflict handling matches `buy`.
    pub async fn sell(&mut self, symbol: &Symbol, quantity: Decimal) -> Result<PortfolioSummary> {
        self.trade(symbol, quantity, Side::Sell).await
    }

    async fn trade(
        &mut self,
        symbol: &Symbol,
        quantity: Decimal,
        side: Side,
    ) -> Result<PortfolioSummary> {
        if symbol.0.trim().is_empty() {
            return Err(Error::InvalidArgument {
                reason: "symbol must not be empty".to_string(),
            });
        }
        if quantity <= Decimal::ZERO {
            return Err(Error::InvalidArgument {
                reason: format!("quantity must be positive, got {quantity}"),
            });
        }
        let mut attempt = 1;
        loop {
            match self.try_trade(symbol, quantity, side).await {
                Err(Error::StoreConflict) if attempt < TRADE_ATTEMPTS => {
                    tracing::warn!(
                        symbol = %symbol.0,
                        side = side.as_str(),
                        attempt,
                        "Trade lost a version race; re-hydrating and retrying."
                    );
                    attempt += 1;
                    self.hydrate().await?;
                }
                outcome => return outcome,
            }
        }
    }

    /// One full trade attempt against the current book and version.
    async fn try_trade(
        &mut self,
        symbol: &Symbol,
        quantity: Decimal,
        side: Side,
    ) -> Result<PortfolioSummary> {
        match side {
            Side::Buy => {
                if !self.book.can_open_new_position(symbol) {
                    return Err(Error::LimitExceeded { max: MAX_POSITIONS });
                }
            }
            Side::Sell => {
                if !self.book.can_sell(symbol, quantity) {
                    return Err(Error::InsufficientShares {
                        symbol: symbol.0.clone(),
                        held: self.book.held_quantity(symbol),
                        requested: quantity,
                    });
                }
            }
        }

        let price = self.oracle.get_latest_price(symbol).await?;
        let gross = price
            .checked_mul(quantity)
            .ok_or_else(|| Error::InvalidArgument {
                reason: format!("trade value of {quantity} shares at {price} is out of range"),
            })?;

        // Stage the trade on a copy. The live book only advances after the
        // store has accepted the commit.
        let mut staged = self.book.clone();
        let change = match side {
            Side::Buy => {
                if !staged.can_afford(gross) {
                    return Err(Error::InsufficientFunds {
                        needed: gross,
                        available: staged.cash,
                    });
                }
                staged.apply_buy(symbol, quantity, gross)?
            }
            Side::Sell => staged.apply_sell(symbol, quantity, gross)?,
        };

        let summary = self.summarize(&staged).await?;
        let commit = TradeCommit {
            expected_version: self.version,
            cash: staged.cash,
            position: change,
            snapshot: snapshot_for_today(&summary),
        };
        let new_version = self.store.commit_trade(&commit).await?;

        self.book = staged;
        self.version = Some(new_version);
        tracing::info!(
            symbol = %symbol.0,
            side = side.as_str(),
            quantity = %quantity,
            price = %price,
            cash = %self.book.cash,
            "Trade committed."
        );
        Ok(summary)
    }

    /// Cash, holdings and marked-to-market P&L of the current book.
    pub async fn portfolio_summary(&self) -> Result<PortfolioSummary> {
        self.summarize(&self.book).await
    }

    /// Unrealized P&L across every open position, `sum((latest - avg) * qty)`.
    ///
    /// All-or-nothing: a single symbol without a price fails the whole
    /// computation rather than under-reporting.
    pub async fn compute_unrealized_pnl(&self) -> Result<Decimal> {
        self.unrealized_pnl_for(&self.book).await
    }

    /// Marks the portfolio to market and stores today's snapshot,
    /// replacing any snapshot already written for the date.
    pub async fn update_daily_pnl(&self) -> Result<PortfolioSummary> {
        let summary = self.summarize(&self.book).await?;
        let snapshot = snapshot_for_today(&summary);
        self.store.upsert_snapshot(&snapshot).await?;
        tracing::info!(
            date = %snapshot.date,
            cash = %snapshot.cash,
            unrealized_pnl = %snapshot.unrealized_pnl,
            total = %snapshot.total,
            "Daily P&L snapshot stored."
        );
        Ok(summary)
    }

    async fn summarize(&self, book: &PositionBook) -> Result<PortfolioSummary> {
        let unrealized_pnl = self.unrealized_pnl_for(book).await?;
        let total = book
            .cash
            .checked_add(unrealized_pnl)
            .ok_or_else(|| Error::InvalidArgument {
                reason: "total portfolio value is out of range".to_string(),
            })?;
        Ok(PortfolioSummary {
            cash: book.cash,
            holdings: book.positions.clone(),
            unrealized_pnl,
            total,
        })
    }

    async fn unrealized_pnl_for(&self, book: &PositionBook) -> Result<Decimal> {
        let mut pnl = Decimal::ZERO;
        for (symbol, position) in &book.positions {
            let price = self.oracle.get_latest_price(symbol).await?;
            pnl = price
                .checked_sub(position.avg_price)
                .and_then(|margin| margin.checked_mul(position.quantity))
                .and_then(|gain| pnl.checked_add(gain))
                .ok_or_else(|| Error::InvalidArgument {
                    reason: format!("unrealized P&L for {} is out of range", symbol.0),
                })?;
        }
        Ok(pnl)
    }
}

fn snapshot_for_today(summary: &PortfolioSummary) -> DailySnapshot {
    DailySnapshot {
        date: Utc::now().date_naive(),
        cash: summary.cash,
        unrealized_pnl: summary.unrealized_pnl,
        total: summary.total,
    }
}
