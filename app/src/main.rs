// In app/src/main.rs

use std::sync::Arc;

use anyhow::Result;
use app_config::Settings;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use core_types::{PortfolioSummary, Symbol};
use ledger::{LedgerEngine, LedgerStore, PriceOracle};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use tracing_subscriber::prelude::*;
use web_server::AppState;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "A cash-and-equities portfolio ledger.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the HTTP API server.
    Serve,

    /// Buys shares at the latest recorded price.
    Buy {
        /// The trading symbol (e.g., "AAPL").
        #[arg(short, long)]
        symbol: String,

        /// Number of shares to buy.
        #[arg(short, long)]
        quantity: Decimal,
    },

    /// Sells shares at the latest recorded price.
    Sell {
        /// The trading symbol (e.g., "AAPL").
        #[arg(short, long)]
        symbol: String,

        /// Number of shares to sell.
        #[arg(short, long)]
        quantity: Decimal,
    },

    /// Prints cash, holdings and mark-to-market P&L as JSON.
    Portfolio,

    /// Marks the portfolio to market and stores today's P&L snapshot.
    Snapshot,

    /// Records the closing price for a symbol on a date.
    RecordPrice {
        /// The trading symbol (e.g., "AAPL").
        #[arg(short, long)]
        symbol: String,

        /// The calendar date in YYYY-MM-DD format. Defaults to today (UTC).
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// The closing price.
        #[arg(short, long)]
        price: Decimal,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let settings = app_config::load_settings()?;

    // --- Tracing Setup ---
    let level = settings
        .app
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::Targets::new()
            .with_target("sqlx::query", tracing::Level::WARN) // Disable sqlx query debug logs
            .with_default(level),
    );
    tracing_subscriber::registry().with(fmt_layer).init();

    // Parse command-line arguments.
    let cli = Cli::parse();

    // Match on the parsed command and call the appropriate handler.
    match cli.command {
        Commands::Serve => {
            handle_serve(settings).await?;
        }
        Commands::Buy { symbol, quantity } => {
            handle_buy(&settings, symbol, quantity).await?;
        }
        Commands::Sell { symbol, quantity } => {
            handle_sell(&settings, symbol, quantity).await?;
        }
        Commands::Portfolio => {
            handle_portfolio(&settings).await?;
        }
        Commands::Snapshot => {
            handle_snapshot(&settings).await?;
        }
        Commands::RecordPrice {
            symbol,
            date,
            price,
        } => {
            handle_record_price(&settings, symbol, date, price).await?;
        }
    }

    Ok(())
}

/// The configured starting cash as an exact decimal.
fn starting_cash(settings: &Settings) -> Result<Decimal> {
    Decimal::from_f64(settings.ledger.starting_cash)
        .ok_or_else(|| anyhow::anyhow!("ledger.starting_cash is not representable as a decimal"))
}

/// Opens a one-shot engine session over the PostgreSQL adapters.
async fn open_session(settings: &Settings) -> Result<LedgerEngine> {
    let db = database::connect(&settings.database).await?;
    let store: Arc<dyn LedgerStore> = Arc::new(db.clone());
    let oracle: Arc<dyn PriceOracle> = Arc::new(db);
    let engine = LedgerEngine::load(store, oracle, starting_cash(settings)?).await?;
    Ok(engine)
}

fn print_summary(summary: &PortfolioSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

// --- "Serve" Subcommand Logic ---

/// The primary logic for the `serve` command.
/// This function wires the PostgreSQL adapters into the web server and runs
/// it indefinitely until terminated.
async fn handle_serve(settings: Settings) -> Result<()> {
    let db = database::connect(&settings.database).await?;
    tracing::info!("Database connection established and migrations are up-to-date.");

    let state = AppState {
        store: Arc::new(db.clone()),
        oracle: Arc::new(db),
        starting_cash: starting_cash(&settings)?,
    };

    web_server::run(settings.server, state).await?;
    Ok(())
}

// --- One-Shot Subcommand Logic ---

/// Handles the logic for the `buy` subcommand.
async fn handle_buy(settings: &Settings, symbol: String, quantity: Decimal) -> Result<()> {
    let mut engine = open_session(settings).await?;
    let summary = engine.buy(&Symbol(symbol), quantity).await?;
    print_summary(&summary)
}

/// Handles the logic for the `sell` subcommand.
async fn handle_sell(settings: &Settings, symbol: String, quantity: Decimal) -> Result<()> {
    let mut engine = open_session(settings).await?;
    let summary = engine.sell(&Symbol(symbol), quantity).await?;
    print_summary(&summary)
}

/// Handles the logic for the `portfolio` subcommand.
async fn handle_portfolio(settings: &Settings) -> Result<()> {
    let engine = open_session(settings).await?;
    let summary = engine.portfolio_summary().await?;
    print_summary(&summary)
}

/// Handles the logic for the `snapshot` subcommand.
async fn handle_snapshot(settings: &Settings) -> Result<()> {
    let engine = open_session(settings).await?;
    let summary = engine.update_daily_pnl().await?;
    print_summary(&summary)
}

/// Handles the logic for the `record-price` subcommand.
async fn handle_record_price(
    settings: &Settings,
    symbol: String,
    date: Option<NaiveDate>,
    price: Decimal,
) -> Result<()> {
    if price <= Decimal::ZERO {
        anyhow::bail!("price must be positive, got {price}");
    }
    let db = database::connect(&settings.database).await?;
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let symbol = Symbol(symbol);
    db.record_daily_price(&symbol, date, price).await?;
    tracing::info!(symbol = %symbol.0, %date, %price, "Recorded daily close price.");
    Ok(())
}
