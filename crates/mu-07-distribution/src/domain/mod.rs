//! Domain layer for distribution.

pub mod batch;
pub mod errors;
pub mod tags;
