// In crates/database/src/lib.rs

use std::collections::HashMap;

use app_config::types::DatabaseSettings;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{DailySnapshot, Position, PositionChange, Symbol};
use ledger::{AccountCash, LedgerStore, PriceOracle, TradeCommit};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};

pub mod error;

// Re-export the most important types for easy access.
pub use error::{Error, Result};

/// A wrapper around the `sqlx` connection pool.
#[derive(Debug, Clone)]
pub struct Db(PgPool);

/// Establishes a connection pool to the PostgreSQL database and runs
/// migrations, so callers always see the current schema.
pub async fn connect(settings: &DatabaseSettings) -> Result<Db> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        // The `?` operator uses the `#[from]` attribute in our error enum
        // to automatically convert the `sqlx::Error` into a `database::Error`.
        .connect(&settings.url)
        .await?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(Error::from)?;

    Ok(Db(pool))
}

impl Db {
    /// Records (or corrects) the closing price for `symbol` on `date`.
    pub async fn record_daily_price(
        &self,
        symbol: &Symbol,
        date: NaiveDate,
        close_price: Decimal,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO daily_prices (symbol, date, close_price) VALUES ($1, $2, $3) \
             ON CONFLICT (symbol, date) DO UPDATE SET close_price = EXCLUDED.close_price",
        )
        .bind(&symbol.0)
        .bind(date)
        .bind(close_price)
        .execute(&self.0)
        .await
        .map_err(Error::Query)?;
        Ok(())
    }
}

/// Converts a low-level sqlx failure into the ledger's store error.
fn store_error(err: sqlx::Error) -> core_types::Error {
    core_types::Error::Store {
        reason: err.to_string(),
    }
}

// The single-row writes below share their SQL with `commit_trade`, which
// runs the same statements inside one transaction.

async fn write_position<'e, E>(executor: E, position: &Position) -> core_types::Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO holdings (symbol, quantity, avg_price) VALUES ($1, $2, $3) \
         ON CONFLICT (symbol) DO UPDATE \
         SET quantity = EXCLUDED.quantity, avg_price = EXCLUDED.avg_price",
    )
    .bind(&position.symbol.0)
    .bind(position.quantity)
    .bind(position.avg_price)
    .execute(executor)
    .await
    .map_err(store_error)?;
    Ok(())
}

async fn remove_position<'e, E>(executor: E, symbol: &Symbol) -> core_types::Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query("DELETE FROM holdings WHERE symbol = $1")
        .bind(&symbol.0)
        .execute(executor)
        .await
        .map_err(store_error)?;
    Ok(())
}

async fn write_snapshot<'e, E>(executor: E, snapshot: &DailySnapshot) -> core_types::Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO pnl_snapshots (date, cash, unrealized_pnl, total) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (date) DO UPDATE \
         SET cash = EXCLUDED.cash, unrealized_pnl = EXCLUDED.unrealized_pnl, \
             total = EXCLUDED.total",
    )
    .bind(snapshot.date)
    .bind(snapshot.cash)
    .bind(snapshot.unrealized_pnl)
    .bind(snapshot.total)
    .execute(executor)
    .await
    .map_err(store_error)?;
    Ok(())
}

#[async_trait]
impl LedgerStore for Db {
    async fn load_positions(&self) -> core_types::Result<HashMap<Symbol, Position>> {
        let rows = sqlx::query("SELECT symbol, quantity, avg_price FROM holdings")
            .fetch_all(&self.0)
            .await
            .map_err(store_error)?;

        let mut positions = HashMap::with_capacity(rows.len());
        for row in rows {
            let symbol = Symbol(row.try_get::<String, _>("symbol").map_err(store_error)?);
            let position = Position {
                symbol: symbol.clone(),
                quantity: row.try_get("quantity").map_err(store_error)?,
                avg_price: row.try_get("avg_price").map_err(store_error)?,
            };
            positions.insert(symbol, position);
        }
        Ok(positions)
    }

    async fn load_latest_cash(&self) -> core_types::Result<Option<AccountCash>> {
        let row = sqlx::query("SELECT cash, version FROM account_state WHERE id = 1")
            .fetch_optional(&self.0)
            .await
            .map_err(store_error)?;
        match row {
            Some(row) => Ok(Some(AccountCash {
                cash: row.try_get("cash").map_err(store_error)?,
                version: row.try_get("version").map_err(store_error)?,
            })),
            None => Ok(None),
        }
    }

    async fn upsert_position(&self, position: &Position) -> core_types::Result<()> {
        write_position(&self.0, position).await
    }

    async fn delete_position(&self, symbol: &Symbol) -> core_types::Result<()> {
        remove_position(&self.0, symbol).await
    }

    async fn upsert_snapshot(&self, snapshot: &DailySnapshot) -> core_types::Result<()> {
        write_snapshot(&self.0, snapshot).await
    }

    async fn recent_snapshots(&self, limit: u32) -> core_types::Result<Vec<DailySnapshot>> {
        let rows = sqlx::query(
            "SELECT date, cash, unrealized_pnl, total FROM pnl_snapshots \
             ORDER BY date DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.0)
        .await
        .map_err(store_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(DailySnapshot {
                    date: row.try_get("date").map_err(store_error)?,
                    cash: row.try_get("cash").map_err(store_error)?,
                    unrealized_pnl: row.try_get("unrealized_pnl").map_err(store_error)?,
                    total: row.try_get("total").map_err(store_error)?,
                })
            })
            .collect()
    }

    async fn commit_trade(&self, commit: &TradeCommit) -> core_types::Result<i64> {
        let mut tx = self.0.begin().await.map_err(store_error)?;

        // Version gate first: a stale session must not touch holdings or
        // snapshots at all.
        let row = match commit.expected_version {
            Some(expected) => sqlx::query(
                "UPDATE account_state SET cash = $1, version = version + 1 \
                 WHERE id = 1 AND version = $2 RETURNING version",
            )
            .bind(commit.cash)
            .bind(expected)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_error)?,
            None => sqlx::query(
                "INSERT INTO account_state (id, cash, version) VALUES (1, $1, 1) \
                 ON CONFLICT (id) DO NOTHING RETURNING version",
            )
            .bind(commit.cash)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_error)?,
        };
        let new_version = match row {
            Some(row) => row.try_get::<i64, _>("version").map_err(store_error)?,
            None => return Err(core_types::Error::StoreConflict),
        };

        match &commit.position {
            PositionChange::Upsert(position) => write_position(&mut *tx, position).await?,
            PositionChange::Remove(symbol) => remove_position(&mut *tx, symbol).await?,
        }
        write_snapshot(&mut *tx, &commit.snapshot).await?;

        tx.commit().await.map_err(store_error)?;
        Ok(new_version)
    }
}

#[async_trait]
impl PriceOracle for Db {
    async fn get_latest_price(&self, symbol: &Symbol) -> core_types::Result<Decimal> {
        let row = sqlx::query(
            "SELECT close_price FROM daily_prices WHERE symbol = $1 \
             ORDER BY date DESC LIMIT 1",
        )
        .bind(&symbol.0)
        .fetch_optional(&self.0)
        .await
        .map_err(store_error)?;
        match row {
            Some(row) => row.try_get("close_price").map_err(store_error),
            None => Err(core_types::Error::PriceUnavailable {
                symbol: symbol.0.clone(),
            }),
        }
    }
}
