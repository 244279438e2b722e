//! # Pipeline Errors
//!
//! Everything that can stop a message after the device lock is taken. These
//! never leave `handle_message`; they are logged, counted and published.

use mu_01_wire_codec::CodecError;
use mu_03_ledger::LedgerError;
use mu_04_chain_mirror::ChainMirrorError;
use mu_05_device_registrar::RegistrarError;
use shared_types::{EnvelopeError, IdentityError};
use thiserror::Error;

use crate::ports::outbound::DownlinkError;

/// Per-message pipeline failure.
#[derive(Debug, Error)]
pub enum UplinkError {
    /// The envelope payload could not be read.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The payload is too short to decode.
    #[error(transparent)]
    Malformed(#[from] CodecError),

    /// The payload's device id is not a valid key.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The signature does not verify against the device key.
    #[error("Invalid signature for {public_key}")]
    InvalidSignature { public_key: String },

    /// Device resolution or registration failed.
    #[error(transparent)]
    Registrar(#[from] RegistrarError),

    /// No ledger record after resolution.
    #[error("Device not found: {dev_eui}")]
    DeviceNotFound { dev_eui: String },

    /// The incoming nonce is neither the next one nor a heartbeat.
    #[error("Nonce mismatch: expected {expected}, received {received}")]
    NonceMismatch { expected: u64, received: u64 },

    /// The ledger rejected a read or write.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A chain reconciliation failed.
    #[error(transparent)]
    Chain(#[from] ChainMirrorError),

    /// The response could not be queued.
    #[error(transparent)]
    Downlink(#[from] DownlinkError),
}

impl UplinkError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UplinkError::Envelope(_) => "invalid_envelope",
            UplinkError::Malformed(_) => "malformed_payload",
            UplinkError::Identity(_) => "invalid_public_key",
            UplinkError::InvalidSignature { .. } => "invalid_signature",
            UplinkError::Registrar(RegistrarError::UnknownDevice { .. }) => "unknown_device",
            UplinkError::Registrar(RegistrarError::Chain(e)) | UplinkError::Chain(e) => {
                chain_kind(e)
            }
            UplinkError::Registrar(RegistrarError::Ledger(e)) | UplinkError::Ledger(e) => {
                ledger_kind(e)
            }
            UplinkError::DeviceNotFound { .. } => "device_not_found",
            UplinkError::NonceMismatch { .. } => "nonce_mismatch",
            UplinkError::Downlink(_) => "downlink_failure",
        }
    }
}

fn chain_kind(error: &ChainMirrorError) -> &'static str {
    match error {
        ChainMirrorError::DeviceNotFound(_) => "device_not_found",
        ChainMirrorError::Ledger(e) => ledger_kind(e),
        ChainMirrorError::RemoteCallFailure { .. } | ChainMirrorError::UnresolvedVerifier { .. } => {
            "remote_call_failure"
        }
    }
}

fn ledger_kind(error: &LedgerError) -> &'static str {
    match error {
        LedgerError::DuplicateTransaction { .. } => "duplicate_transaction",
        LedgerError::StorageFailure(_) => "storage_failure",
    }
}
