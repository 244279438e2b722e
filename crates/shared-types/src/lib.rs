//! # Shared Types Crate
//!
//! Domain entities, the transport envelope and cross-cutting helpers used by
//! every subsystem of the meter uplink node.
//!
//! ## Contents
//!
//! - [`entities`]: `DeviceRecord`, `TransactionRecord`, `PublicKey`, batch payloads
//! - [`envelope`]: the JSON message delivered by the transport
//! - [`retry`]: exponential backoff for remote calls
//! - [`time`]: clock abstraction for record timestamps

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod retry;
pub mod time;

pub use entities::*;
pub use envelope::{DeviceInfo, TransportEnvelope};
pub use errors::*;
pub use retry::{retry_with_backoff, RetryError, RetryPolicy};
pub use time::{FixedTimeSource, SystemTimeSource, TimeSource};
