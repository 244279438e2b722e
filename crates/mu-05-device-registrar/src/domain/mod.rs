//! Domain layer for the device registrar.

pub mod errors;
pub mod registration;
