//! # Ledger Errors
//!
//! Callers distinguish exactly two failure modes: the expected duplicate
//! transaction, and everything else.

use shared_types::TokenId;
use std::fmt;
use thiserror::Error;

/// Errors surfaced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A transaction with this `(nonce, identifier)` is already recorded.
    #[error("Duplicate transaction: nonce {nonce} for token {identifier}")]
    DuplicateTransaction { nonce: u64, identifier: TokenId },

    /// I/O, serialization or constraint failure. No partial write was applied.
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl LedgerError {
    /// Shorthand for a constraint violation.
    pub fn constraint(message: impl Into<String>) -> Self {
        LedgerError::StorageFailure(message.into())
    }
}

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    IOError { message: String },
    /// Data corruption in the store.
    CorruptionError { message: String },
}

impl fmt::Display for KVStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KVStoreError::IOError { message } => write!(f, "KV store I/O error: {}", message),
            KVStoreError::CorruptionError { message } => {
                write!(f, "KV store corruption: {}", message)
            }
        }
    }
}

impl std::error::Error for KVStoreError {}

impl From<KVStoreError> for LedgerError {
    fn from(err: KVStoreError) -> Self {
        LedgerError::StorageFailure(err.to_string())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::StorageFailure(format!("record encoding: {}", err))
    }
}
