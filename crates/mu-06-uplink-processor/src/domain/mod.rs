//! Domain layer for the uplink processor.

pub mod config;
pub mod errors;
pub mod outcome;
