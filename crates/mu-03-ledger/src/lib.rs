//! # Ledger Subsystem
//!
//! Durable storage for device records and accepted transactions.
//!
//! ## Architecture
//!
//! ```text
//! ports/inbound.rs    LedgerApi
//! ports/outbound.rs   KeyValueStore (+ InMemoryKVStore)
//! domain/keys.rs      key layout and secondary indexes
//! service.rs          LedgerService<KV>
//! ```
//!
//! ## Guarantees
//!
//! - `(nonce, identifier)` is unique; duplicates fail with `DuplicateTransaction`
//! - Accepting a transaction and advancing `latest_nonce` is one atomic batch
//! - Pruning is the only deletion path for transactions

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::errors::{KVStoreError, LedgerError};
pub use domain::keys::KeyPrefix;
pub use ports::inbound::LedgerApi;
pub use ports::outbound::{BatchOperation, InMemoryKVStore, KeyValueStore};
pub use service::LedgerService;
