//! # Production Storage Adapters
//!
//! Enable the `rocksdb` feature for a durable ledger:
//!
//! ```toml
//! node-runtime = { path = "...", features = ["rocksdb"] }
//! ```
//!
//! Without it the node runs on `InMemoryKVStore` and loses its ledger on
//! restart.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};

pub use mu_03_ledger::InMemoryKVStore;
