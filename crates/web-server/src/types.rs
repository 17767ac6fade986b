// In crates/web-server/src/types.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Query parameters shared by the buy and sell endpoints
/// (e.g. `?symbol=AAPL&quantity=10`).
#[derive(Debug, Deserialize)]
pub struct TradeParams {
    pub symbol: String,
    pub quantity: Decimal,
}

/// Query parameters for the snapshot history endpoint (e.g. `?limit=30`).
#[derive(Debug, Deserialize)]
pub struct SnapshotParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable description of what was refused and why.
    pub error: String,
    /// Stable machine-readable discriminant, e.g. "insufficient_funds".
    pub kind: String,
}

// Helper function for serde defaults.
fn default_limit() -> u32 {
    30
}
