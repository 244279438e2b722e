//! # Chain Mirror Subsystem
//!
//! Reconciles the local ledger with the authoritative on-chain nonce and
//! reads the billing figures used to compute a device's on/off state.
//!
//! ## Architecture
//!
//! ```text
//! ports/inbound.rs     ChainMirrorApi
//! ports/outbound.rs    ChainReader (+ MockChainReader)
//! verifier_cache.rs    all-or-nothing verifier registry snapshot
//! service.rs           ChainMirror
//! ```
//!
//! ## Policies
//!
//! - The watermark only moves up during sync; pruning runs unconditionally
//! - Verifier discovery fails fast; verifier reads degrade per verifier

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod ports;
pub mod service;
pub mod verifier_cache;

pub use domain::errors::{ChainError, ChainMirrorError};
pub use domain::verifier::{Address, VerifierInfo};
pub use ports::inbound::ChainMirrorApi;
pub use ports::outbound::{ChainReader, MockChainReader};
pub use primitive_types::U256;
pub use service::ChainMirror;
pub use verifier_cache::VerifierCache;
