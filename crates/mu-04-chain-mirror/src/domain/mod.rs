//! Domain layer: verifier entries, addresses and errors.

pub mod errors;
pub mod verifier;
