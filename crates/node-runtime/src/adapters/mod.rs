//! # Adapter Implementations
//!
//! Concrete implementations of the outbound ports declared by the
//! subsystem crates.
//!
//! | Adapter               | Port                        | Backed by      |
//! |-----------------------|-----------------------------|----------------|
//! | `JsonRpcChainReader`  | `mu-04` `ChainReader`       | `reqwest`      |
//! | `MqttDownlink`        | `mu-06` `DownlinkQueue`     | `rumqttc`      |
//! | `RocksDbStore`        | `mu-03` `KeyValueStore`     | `rocksdb`      |
//!
//! The uplink subscriber in `mqtt` drives the processor's inbound port.

pub mod chain_rpc;
pub mod mqtt;
pub mod storage;

pub use chain_rpc::{ChainContracts, JsonRpcChainReader};
pub use mqtt::{run_uplink_subscriber, MqttDownlink};
