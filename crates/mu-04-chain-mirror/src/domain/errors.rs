//! # Chain Mirror Errors

use mu_03_ledger::LedgerError;
use shared_types::DeviceIdentifier;
use thiserror::Error;

/// Errors surfaced by the chain mirror.
#[derive(Debug, Clone, Error)]
pub enum ChainMirrorError {
    /// No ledger record for the requested device.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceIdentifier),

    /// A chain read failed after all retries.
    #[error("Remote call {call} failed: {reason}")]
    RemoteCallFailure { call: &'static str, reason: String },

    /// A verifier name resolved to nothing or to the zero address.
    #[error("Verifier {name} did not resolve to an address")]
    UnresolvedVerifier { name: String },

    /// The ledger rejected a read or write.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors returned by a chain reader implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Transport or node error.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The node answered with something that could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The key or token is unknown to the contract.
    #[error("Not registered: {0}")]
    NotRegistered(String),
}
