//! # Error Types
//!
//! Errors shared by more than one subsystem.

use thiserror::Error;

/// Errors raised while reading the transport envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The envelope is not valid JSON.
    #[error("Invalid envelope JSON: {0}")]
    InvalidJson(String),

    /// `deviceInfo.devEui` is absent or empty.
    #[error("Missing device identifier")]
    MissingDeviceIdentifier,

    /// `data` is not valid base64.
    #[error("Invalid payload encoding: {0}")]
    InvalidPayloadEncoding(String),
}

/// Errors raised while parsing device identities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The public key is not 32 bytes of hex.
    #[error("Invalid public key: {reason}")]
    InvalidPublicKey { reason: String },
}
