//! Ports for the ledger subsystem.

pub mod inbound;
pub mod outbound;
