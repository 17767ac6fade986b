// In crates/core-types/src/error.rs

use rust_decimal::Decimal;
use thiserror::Error;

/// Everything a ledger operation can fail with.
///
/// The first five variants are detected before any state is touched and are
/// safe to retry with corrected input. `StoreConflict` and `Store` surface
/// persistence problems; a caller that sees one must not trust in-memory
/// state and should start a fresh session from the store.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
    #[error("maximum number of holdings reached ({max})")]
    LimitExceeded { max: usize },
    #[error("insufficient cash: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    #[error("not enough shares of {symbol} to sell: have {held}, trying to sell {requested}")]
    InsufficientShares {
        symbol: String,
        held: Decimal,
        requested: Decimal,
    },
    #[error("no price data for symbol {symbol}")]
    PriceUnavailable { symbol: String },
    #[error("account state changed underneath this session")]
    StoreConflict,
    #[error("ledger store failure: {reason}")]
    Store { reason: String },
}

impl Error {
    /// Machine-readable kind, stable across message wording changes.
    /// The HTTP layer puts this next to the human-readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::LimitExceeded { .. } => "limit_exceeded",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::InsufficientShares { .. } => "insufficient_shares",
            Error::PriceUnavailable { .. } => "price_unavailable",
            Error::StoreConflict => "store_conflict",
            Error::Store { .. } => "store_failure",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
