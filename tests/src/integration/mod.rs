//! Cross-subsystem integration tests.

pub mod harness;
pub mod properties;
pub mod scenarios;
