//! # Signature Verification Subsystem
//!
//! Authenticates device uplinks with Ed25519.
//!
//! ## Architecture
//!
//! ```text
//! domain/ed25519.rs   key envelope handling + verification
//! ports/inbound.rs    SignatureVerificationApi
//! service.rs          UplinkSignatureVerifier
//! ```
//!
//! Callers cannot distinguish an invalid signature from an unverifiable one:
//! both are `false`.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::errors::SignatureError;
pub use ports::inbound::SignatureVerificationApi;
pub use service::UplinkSignatureVerifier;
