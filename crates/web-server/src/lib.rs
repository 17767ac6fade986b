// In crates/web-server/src/lib.rs

use std::sync::Arc;

use app_config::types::ServerSettings;
use axum::Router;
use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use core_types::{DailySnapshot, PortfolioSummary, Symbol};
use ledger::{LedgerEngine, LedgerStore, PriceOracle};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use types::{SnapshotParams, TradeParams};

pub mod error;
pub mod types;

// Re-export our custom error type for convenience.
pub use error::{Error, Result};

/// The shared application state that is available to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub oracle: Arc<dyn PriceOracle>,
    /// Cash a brand-new account starts with.
    pub starting_cash: Decimal,
}

impl AppState {
    /// A fresh engine session hydrated from the store.
    ///
    /// Each request gets its own session; the store's version check in
    /// `commit_trade` arbitrates overlapping requests.
    async fn session(&self) -> core_types::Result<LedgerEngine> {
        LedgerEngine::load(self.store.clone(), self.oracle.clone(), self.starting_cash).await
    }
}

/// Creates the main application router with all routes and middleware.
pub fn create_router(app_state: AppState) -> Router {
    // Define a CORS layer to allow requests from our frontend.
    // In a production environment, you would restrict the origin to your actual frontend domain.
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    // Define the API sub-router.
    let api_router = Router::new()
        .route("/buy", post(buy_handler))
        .route("/sell", post(sell_handler))
        .route("/portfolio", get(get_portfolio_handler))
        .route("/pnl", get(get_pnl_history_handler))
        .route("/pnl/update", post(update_pnl_handler));

    // The main router.
    Router::new()
        .route("/health", get(health_check_handler))
        .nest("/api", api_router)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// A simple health check handler.
/// Responds with a 200 OK and a plain-text body.
async fn health_check_handler() -> &'static str {
    "OK"
}

/// Handler for `POST /api/buy?symbol=AAPL&quantity=10`.
/// Executes a buy at the latest recorded price and returns the resulting
/// portfolio summary.
async fn buy_handler(
    State(state): State<AppState>,
    Query(params): Query<TradeParams>,
) -> Result<Json<PortfolioSummary>> {
    let symbol = Symbol(params.symbol);
    tracing::info!(symbol = %symbol.0, quantity = %params.quantity, "Buy request received.");
    let mut engine = state.session().await?;
    let summary = engine.buy(&symbol, params.quantity).await?;
    Ok(Json(summary))
}

/// Handler for `POST /api/sell?symbol=AAPL&quantity=10`.
async fn sell_handler(
    State(state): State<AppState>,
    Query(params): Query<TradeParams>,
) -> Result<Json<PortfolioSummary>> {
    let symbol = Symbol(params.symbol);
    tracing::info!(symbol = %symbol.0, quantity = %params.quantity, "Sell request received.");
    let mut engine = state.session().await?;
    let summary = engine.sell(&symbol, params.quantity).await?;
    Ok(Json(summary))
}

/// Handler for `GET /api/portfolio`.
/// Returns cash, holdings and mark-to-market P&L without mutating anything.
async fn get_portfolio_handler(
    State(state): State<AppState>,
) -> Result<Json<PortfolioSummary>> {
    let engine = state.session().await?;
    let summary = engine.portfolio_summary().await?;
    Ok(Json(summary))
}

/// Handler for `POST /api/pnl/update`.
/// Marks the portfolio to market and stores today's snapshot.
async fn update_pnl_handler(State(state): State<AppState>) -> Result<Json<PortfolioSummary>> {
    let engine = state.session().await?;
    let summary = engine.update_daily_pnl().await?;
    Ok(Json(summary))
}

/// Handler for `GET /api/pnl?limit=30`.
/// Returns stored snapshots, most recent date first.
async fn get_pnl_history_handler(
    State(state): State<AppState>,
    Query(params): Query<SnapshotParams>,
) -> Result<Json<Vec<DailySnapshot>>> {
    let snapshots = state.store.recent_snapshots(params.limit).await?;
    Ok(Json(snapshots))
}

/// The main entry point for running the web server.
///
/// This function sets up the TCP listener and serves the application router.
/// It will run forever until the process is terminated.
pub async fn run(settings: ServerSettings, app_state: AppState) -> Result<()> {
    let app = create_router(app_state);

    let address = format!("{}:{}", settings.host, settings.port);
    tracing::info!("Web server listening on {}", address);

    let listener = TcpListener::bind(&address).await?;

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
