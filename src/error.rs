//! Error types for the wallet core.

use crate::types::DocumentId;
use thiserror::Error;

/// Main error type for store, sync and identity operations.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Invalid document id: {0:?}")]
    InvalidDocumentId(DocumentId),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Listener failed: {0}")]
    ListenerFailed(String),

    #[error("Listener closed")]
    ListenerClosed,

    #[error("Invalid color value: {0:#018x}")]
    InvalidColor(i64),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("No signed-in user")]
    NotSignedIn,

    #[error("Wallet is closed")]
    Closed,
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            WalletError::Deserialization(e.to_string())
        } else {
            WalletError::Serialization(e.to_string())
        }
    }
}

impl From<rmp_serde::encode::Error> for WalletError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        WalletError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for WalletError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        WalletError::Deserialization(e.to_string())
    }
}

impl From<rust_decimal::Error> for WalletError {
    fn from(e: rust_decimal::Error) -> Self {
        WalletError::InvalidAmount(e.to_string())
    }
}

/// Result type for wallet operations.
pub type Result<T> = std::result::Result<T, WalletError>;
