// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::rpc::QueryError;
use crate::session::Phase;
use crate::wallet::WalletError;

/// Decoding or arithmetic failure on an amount, a payload or user input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("amount {0:?} is not an unsigned integer")]
    InvalidAmount(String),

    #[error("amount {0:?} exceeds the Uint128 range")]
    AmountOverflow(String),

    #[error("unexpected {what} response: {reason}")]
    Payload { what: &'static str, reason: String },

    #[error("token address is empty")]
    EmptyTokenAddress,

    #[error("{0:?} is not a Secret Network contract address")]
    InvalidTokenAddress(String),
}

/// Every failure a user-triggered action can end with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Wallet not found. Is it configured and unlocked?")]
    WalletUnavailable,

    #[error("Wallet not connected: {0}")]
    WalletNotConnected(String),

    #[error("Viewing key not found for {token}, please add the token to your wallet.")]
    CredentialMissing { token: String },

    #[error("{0}")]
    RemoteQuery(String),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Another action is still running ({0})")]
    Busy(Phase),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Token {0} is not listed for the selected network")]
    UnknownToken(String),

    #[error("No transactions loaded. Submit a query first.")]
    NoResults,
}

impl AppError {
    /// Stable machine-readable name used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::WalletUnavailable => "wallet_unavailable",
            AppError::WalletNotConnected(_) => "wallet_not_connected",
            AppError::CredentialMissing { .. } => "credential_missing",
            AppError::RemoteQuery(_) => "remote_query",
            AppError::Format(_) => "format",
            AppError::Busy(_) => "busy",
            AppError::UnknownNetwork(_) => "unknown_network",
            AppError::UnknownToken(_) => "unknown_token",
            AppError::NoResults => "no_results",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::WalletUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::WalletNotConnected(_) | AppError::Busy(_) => StatusCode::CONFLICT,
            AppError::CredentialMissing { .. } => StatusCode::FORBIDDEN,
            AppError::RemoteQuery(_) => StatusCode::BAD_GATEWAY,
            AppError::Format(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UnknownNetwork(_) | AppError::UnknownToken(_) | AppError::NoResults => {
                StatusCode::NOT_FOUND
            }
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::RemoteQuery(err.to_string())
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        AppError::WalletNotConnected(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));

        (self.status(), body).into_response()
    }
}
