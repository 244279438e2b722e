//! Adapters owned by the ledger crate.

pub mod serializer;
