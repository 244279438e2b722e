//! # Device Registrar Subsystem
//!
//! Maps uplink identity (payload key, transport identifier) onto a ledger
//! record.
//!
//! - Unknown key: register under the chain's token id, replacing a record
//!   that held the token under a rotated key
//! - Known key: backfill the transport identifier, re-derive the watermark
//! - No key: look up by transport identifier

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::errors::RegistrarError;
pub use domain::registration::Registration;
pub use ports::inbound::DeviceRegistrarApi;
pub use service::DeviceRegistrar;
