//! Domain layer: payload shapes and codec errors.

pub mod errors;
pub mod payload;
