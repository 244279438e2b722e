//! Ports for distribution.

pub mod inbound;
pub mod outbound;
