//! # Signature Errors
//!
//! Internal failure reasons. They never cross the subsystem boundary: the
//! public API collapses every one of them into `false`.

use thiserror::Error;

/// Reasons a signature could not be accepted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The uplink is shorter than the signed region plus signature.
    #[error("Uplink too short for signature check: {length} bytes")]
    TruncatedMessage { length: usize },

    /// The key is neither 32 raw bytes nor a 44-byte SPKI envelope.
    #[error("Invalid public key encoding: {length} bytes")]
    InvalidKeyEncoding { length: usize },

    /// The key bytes are not a valid curve point.
    #[error("Invalid Ed25519 public key")]
    InvalidPublicKey,

    /// The signature does not match message and key.
    #[error("Signature verification failed")]
    VerificationFailed,
}
