//! # Node Runtime Library
//!
//! Configuration, subsystem wiring, transport and chain adapters, and the
//! scheduled jobs of the meter uplink node. The entry point is `main.rs`.
//!
//! ## Layout
//!
//! - `container/` - configuration and dependency injection
//! - `adapters/` - MQTT transport, JSON-RPC chain reader, RocksDB ledger store
//! - `jobs` - periodic prune-sync and batch delivery
//! - `observers` - lifecycle observers registered at startup

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod container;
pub mod jobs;
pub mod observers;

pub use container::{ConfigError, ContainerError, NodeConfig, SubsystemContainer};
pub use jobs::{Jobs, SyncReport};
pub use observers::EventLogObserver;
