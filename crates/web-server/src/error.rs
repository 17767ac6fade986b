// In crates/web-server/src/error.rs

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

use crate::types::ErrorBody;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Ledger(#[from] core_types::Error),
    #[error("web server I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Ledger(err) => {
                let status = match &err {
                    core_types::Error::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
                    core_types::Error::LimitExceeded { .. }
                    | core_types::Error::InsufficientFunds { .. }
                    | core_types::Error::InsufficientShares { .. } => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    core_types::Error::PriceUnavailable { .. } => StatusCode::NOT_FOUND,
                    core_types::Error::StoreConflict => StatusCode::CONFLICT,
                    core_types::Error::Store { .. } => StatusCode::BAD_GATEWAY,
                };
                if status.is_server_error() {
                    tracing::error!(error = %err, "Request failed against the store.");
                } else {
                    tracing::warn!(error = %err, "Request rejected.");
                }
                let body = ErrorBody {
                    error: err.to_string(),
                    kind: err.kind().to_string(),
                };
                (status, Json(body)).into_response()
            }
            Error::Io(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}
