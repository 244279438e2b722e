//! Bincode record encoding.

use serde::{de::DeserializeOwned, Serialize};

use crate::domain::errors::LedgerError;

/// Encode a record for storage.
pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, LedgerError> {
    Ok(bincode::serialize(record)?)
}

/// Decode a stored record.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LedgerError> {
    Ok(bincode::deserialize(bytes)?)
}
