//! Ports for the device registrar.

pub mod inbound;
