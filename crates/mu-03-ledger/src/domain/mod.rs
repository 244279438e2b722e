//! Domain layer: key layout and ledger errors.

pub mod errors;
pub mod keys;
