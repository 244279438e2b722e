//! # Uplink Processor Subsystem
//!
//! The core pipeline: one raw transport message in, at most one committed
//! transaction and one queued response out.
//!
//! ## Guarantees
//!
//! - At most one in-flight message per transport identifier; extras are dropped
//! - A transaction is accepted only at `latest_nonce + 1`, and the insert and
//!   watermark update are one atomic ledger write
//! - Nonce `0` is a heartbeat: answered with the current watermark, never stored
//! - Fan-out runs after the commit, off the device lock
//! - Nothing escapes `handle_message`

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod lock_registry;
pub mod ports;
pub mod service;

pub use domain::config::{ProcessorConfig, DEFAULT_SYNC_EPOCH};
pub use domain::errors::UplinkError;
pub use domain::outcome::MessageOutcome;
pub use lock_registry::{DeviceLockGuard, DeviceLockRegistry};
pub use ports::inbound::UplinkProcessorApi;
pub use ports::outbound::{DownlinkError, DownlinkQueue, RecordingDownlink};
pub use service::{Collaborators, UplinkProcessor};
