//! Ports for the signature verification subsystem.

pub mod inbound;
