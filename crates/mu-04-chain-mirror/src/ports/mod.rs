//! Ports for the chain mirror subsystem.

pub mod inbound;
pub mod outbound;
