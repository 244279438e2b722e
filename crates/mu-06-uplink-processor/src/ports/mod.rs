//! Ports for the uplink processor.

pub mod inbound;
pub mod outbound;
