//! Outcome of a registration pass.

use shared_types::{DeviceRecord, PublicKey};

/// What the registrar did for a self-identifying uplink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// First sighting of the key; a new record was saved.
    Created(DeviceRecord),
    /// The token id moved to a new key; the stale record was removed.
    Rotated {
        /// The record saved under the new key.
        record: DeviceRecord,
        /// Key of the record that was deleted.
        previous_key: PublicKey,
    },
    /// Known key; transport identifier and watermark refreshed.
    Refreshed(DeviceRecord),
}

impl Registration {
    /// The record as it now stands in the ledger.
    pub fn record(&self) -> &DeviceRecord {
        match self {
            Registration::Created(record)
            | Registration::Rotated { record, .. }
            | Registration::Refreshed(record) => record,
        }
    }

    /// True when a record was written for a key not seen before.
    pub fn is_new(&self) -> bool {
        !matches!(self, Registration::Refreshed(_))
    }
}
