//! # Registrar Errors

use mu_03_ledger::LedgerError;
use mu_04_chain_mirror::ChainMirrorError;
use thiserror::Error;

/// Errors surfaced while resolving a device.
#[derive(Debug, Clone, Error)]
pub enum RegistrarError {
    /// The payload carried no key and the transport identifier is unknown.
    #[error("Unknown device: {dev_eui}")]
    UnknownDevice { dev_eui: String },

    /// Token lookup or nonce derivation against the chain failed.
    #[error(transparent)]
    Chain(#[from] ChainMirrorError),

    /// The ledger rejected a read or write.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
