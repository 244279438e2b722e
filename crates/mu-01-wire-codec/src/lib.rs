//! # Wire Codec Subsystem
//!
//! Bit-exact decoding of device uplinks and encoding of downlink responses.
//!
//! ## Guarantees
//!
//! - `decode` is pure and deterministic; short extension blocks are not errors
//! - `encode` emits the nonce only when the response carries one, so output is
//!   9 or 13 bytes

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod codec;
pub mod domain;

pub use codec::{decode, encode};
pub use domain::errors::CodecError;
pub use domain::payload::{
    DecodedPayload, PayloadExtensions, ResponseState, MIN_UPLINK_LEN, SIGNED_REGION_LEN,
};
