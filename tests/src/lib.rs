//! # Meter Uplink Test Suite
//!
//! Cross-subsystem tests wiring the real ledger, chain mirror, registrar,
//! processor and fan-out against mock chain, downlink and sink adapters.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs     # Wired pipeline + signed uplink builders
//!     ├── scenarios.rs   # End-to-end device scenarios
//!     └── properties.rs  # Ledger, lock, codec and cache invariants
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p mu-tests
//!
//! # By category
//! cargo test -p mu-tests integration::scenarios::
//! cargo test -p mu-tests integration::properties::
//! ```

#![allow(dead_code)]

pub mod integration;
