//! Domain layer: Ed25519 verification of the signed uplink region.

pub mod ed25519;
pub mod errors;
