//! # Ledger Service
//!
//! Implements [`LedgerApi`] over any [`KeyValueStore`].
//!
//! Reads take a shared lock, writes an exclusive one; every check a write
//! depends on (duplicate detection, index ownership) runs under the same
//! exclusive lock as the batch that applies it.

use parking_lot::RwLock;
use shared_types::{DeviceRecord, PublicKey, TokenId, TransactionRecord};
use tracing::{debug, info};

use crate::adapters::serializer::{decode, encode};
use crate::domain::errors::LedgerError;
use crate::domain::keys::KeyPrefix;
use crate::ports::inbound::LedgerApi;
use crate::ports::outbound::{BatchOperation, KeyValueStore};

/// The ledger service.
pub struct LedgerService<KV: KeyValueStore> {
    store: RwLock<KV>,
}

impl<KV: KeyValueStore> LedgerService<KV> {
    /// Wrap a key-value store.
    pub fn new(store: KV) -> Self {
        Self {
            store: RwLock::new(store),
        }
    }

    fn read_device(store: &KV, public_key: &PublicKey) -> Result<Option<DeviceRecord>, LedgerError> {
        store
            .get(&KeyPrefix::device_key(public_key))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn read_indexed(store: &KV, index_key: &[u8]) -> Result<Option<DeviceRecord>, LedgerError> {
        let Some(owner) = store.get(index_key)? else {
            return Ok(None);
        };
        let public_key = PublicKey::from_slice(&owner)
            .map_err(|e| LedgerError::StorageFailure(format!("corrupt index entry: {}", e)))?;
        Self::read_device(store, &public_key)
    }

    /// Batch that writes `record` and moves its indexes away from `previous`.
    fn device_write_ops(
        store: &KV,
        previous: Option<&DeviceRecord>,
        record: &DeviceRecord,
    ) -> Result<Vec<BatchOperation>, LedgerError> {
        let owner = record.public_key.as_bytes();

        if let Some(prev) = previous {
            if prev.token_id != record.token_id {
                return Err(LedgerError::constraint(format!(
                    "token id of {} is immutable ({} -> {})",
                    record.public_key, prev.token_id, record.token_id
                )));
            }
        }

        if let Some(existing) = store.get(&KeyPrefix::token_key(record.token_id))? {
            if existing != owner {
                return Err(LedgerError::constraint(format!(
                    "token id {} already belongs to another device",
                    record.token_id
                )));
            }
        }

        if let Some(eui) = &record.dev_eui {
            if let Some(existing) = store.get(&KeyPrefix::dev_eui_key(eui))? {
                if existing != owner {
                    return Err(LedgerError::constraint(format!(
                        "dev eui {} already belongs to another device",
                        eui
                    )));
                }
            }
        }

        let mut ops = Vec::with_capacity(4);
        if let Some(old_eui) = previous.and_then(|p| p.dev_eui.as_ref()) {
            if record.dev_eui.as_ref() != Some(old_eui) {
                ops.push(BatchOperation::delete(KeyPrefix::dev_eui_key(old_eui)));
            }
        }
        ops.push(BatchOperation::put(
            KeyPrefix::device_key(&record.public_key),
            encode(record)?,
        ));
        ops.push(BatchOperation::put(
            KeyPrefix::token_key(record.token_id),
            owner.to_vec(),
        ));
        if let Some(eui) = &record.dev_eui {
            ops.push(BatchOperation::put(KeyPrefix::dev_eui_key(eui), owner.to_vec()));
        }
        Ok(ops)
    }

    fn scan_transactions(store: &KV, prefix: &[u8]) -> Result<Vec<TransactionRecord>, LedgerError> {
        store
            .prefix_scan(prefix)?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    fn prune_where(
        &self,
        identifier: TokenId,
        doomed: impl Fn(u64) -> bool,
    ) -> Result<usize, LedgerError> {
        let mut store = self.store.write();
        let ops: Vec<BatchOperation> = store
            .prefix_scan(&KeyPrefix::transactions_for(identifier))?
            .into_iter()
            .filter(|(key, _)| KeyPrefix::nonce_from_transaction_key(key).is_some_and(&doomed))
            .map(|(key, _)| BatchOperation::delete(key))
            .collect();

        let count = ops.len();
        if count > 0 {
            store.atomic_batch_write(ops)?;
        }
        Ok(count)
    }
}

impl<KV: KeyValueStore> LedgerApi for LedgerService<KV> {
    fn save_device(&self, record: &DeviceRecord) -> Result<(), LedgerError> {
        let mut store = self.store.write();
        let previous = Self::read_device(&store, &record.public_key)?;
        let ops = Self::device_write_ops(&store, previous.as_ref(), record)?;
        store.atomic_batch_write(ops)?;
        debug!(
            public_key = %record.public_key,
            token_id = record.token_id,
            latest_nonce = record.latest_nonce,
            "[mu-03] Device saved"
        );
        Ok(())
    }

    fn get_device_by_public_key(
        &self,
        public_key: &PublicKey,
    ) -> Result<Option<DeviceRecord>, LedgerError> {
        Self::read_device(&self.store.read(), public_key)
    }

    fn get_device_by_dev_eui(&self, dev_eui: &str) -> Result<Option<DeviceRecord>, LedgerError> {
        Self::read_indexed(&self.store.read(), &KeyPrefix::dev_eui_key(dev_eui))
    }

    fn get_device_by_token_id(
        &self,
        token_id: TokenId,
    ) -> Result<Option<DeviceRecord>, LedgerError> {
        Self::read_indexed(&self.store.read(), &KeyPrefix::token_key(token_id))
    }

    fn get_all_devices(&self) -> Result<Vec<DeviceRecord>, LedgerError> {
        self.store
            .read()
            .prefix_scan(KeyPrefix::Device.as_bytes())?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    fn delete_device_by_public_key(&self, public_key: &PublicKey) -> Result<bool, LedgerError> {
        let mut store = self.store.write();
        let Some(record) = Self::read_device(&store, public_key)? else {
            return Ok(false);
        };

        let mut ops = vec![BatchOperation::delete(KeyPrefix::device_key(public_key))];
        let token_key = KeyPrefix::token_key(record.token_id);
        if store.get(&token_key)?.as_deref() == Some(public_key.as_bytes().as_slice()) {
            ops.push(BatchOperation::delete(token_key));
        }
        if let Some(eui) = &record.dev_eui {
            ops.push(BatchOperation::delete(KeyPrefix::dev_eui_key(eui)));
        }
        store.atomic_batch_write(ops)?;

        info!(public_key = %public_key, token_id = record.token_id, "[mu-03] Device deleted");
        Ok(true)
    }

    fn update_device_nonce(&self, public_key: &PublicKey, nonce: u64) -> Result<bool, LedgerError> {
        let mut store = self.store.write();
        let Some(mut record) = Self::read_device(&store, public_key)? else {
            return Ok(false);
        };
        record.latest_nonce = nonce;
        store.atomic_batch_write(vec![BatchOperation::put(
            KeyPrefix::device_key(public_key),
            encode(&record)?,
        )])?;
        Ok(true)
    }

    fn raise_device_nonce(&self, public_key: &PublicKey, nonce: u64) -> Result<bool, LedgerError> {
        let mut store = self.store.write();
        let Some(mut record) = Self::read_device(&store, public_key)? else {
            return Ok(false);
        };
        if record.latest_nonce >= nonce {
            return Ok(false);
        }
        record.latest_nonce = nonce;
        store.atomic_batch_write(vec![BatchOperation::put(
            KeyPrefix::device_key(public_key),
            encode(&record)?,
        )])?;
        Ok(true)
    }

    fn update_device_eui(&self, public_key: &PublicKey, dev_eui: &str) -> Result<bool, LedgerError> {
        let mut store = self.store.write();
        let Some(previous) = Self::read_device(&store, public_key)? else {
            return Ok(false);
        };
        let updated = DeviceRecord {
            dev_eui: Some(dev_eui.to_string()),
            ..previous.clone()
        };
        let ops = Self::device_write_ops(&store, Some(&previous), &updated)?;
        store.atomic_batch_write(ops)?;
        Ok(true)
    }

    fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), LedgerError> {
        let mut store = self.store.write();
        let key = KeyPrefix::transaction_key(record.identifier, record.nonce);
        if store.exists(&key)? {
            return Err(LedgerError::DuplicateTransaction {
                nonce: record.nonce,
                identifier: record.identifier,
            });
        }
        store.atomic_batch_write(vec![BatchOperation::put(key, encode(record)?)])?;
        Ok(())
    }

    fn record_accepted_transaction(
        &self,
        public_key: &PublicKey,
        record: &TransactionRecord,
    ) -> Result<(), LedgerError> {
        let mut store = self.store.write();

        let Some(mut device) = Self::read_device(&store, public_key)? else {
            return Err(LedgerError::constraint(format!(
                "no device for {}",
                public_key
            )));
        };
        if device.token_id != record.identifier {
            return Err(LedgerError::constraint(format!(
                "transaction identifier {} does not match device token {}",
                record.identifier, device.token_id
            )));
        }

        let tx_key = KeyPrefix::transaction_key(record.identifier, record.nonce);
        if store.exists(&tx_key)? {
            return Err(LedgerError::DuplicateTransaction {
                nonce: record.nonce,
                identifier: record.identifier,
            });
        }

        device.latest_nonce = device.latest_nonce.max(record.nonce);
        store.atomic_batch_write(vec![
            BatchOperation::put(tx_key, encode(record)?),
            BatchOperation::put(KeyPrefix::device_key(public_key), encode(&device)?),
        ])?;

        debug!(
            token_id = record.identifier,
            nonce = record.nonce,
            "[mu-03] Transaction recorded"
        );
        Ok(())
    }

    fn get_all_transactions(&self) -> Result<Vec<TransactionRecord>, LedgerError> {
        Self::scan_transactions(&self.store.read(), KeyPrefix::Transaction.as_bytes())
    }

    fn get_transactions_for(
        &self,
        identifier: TokenId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        Self::scan_transactions(&self.store.read(), &KeyPrefix::transactions_for(identifier))
    }

    fn get_transaction_by_nonce(
        &self,
        nonce: u64,
        identifier: TokenId,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        self.store
            .read()
            .get(&KeyPrefix::transaction_key(identifier, nonce))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn prune_transactions_before(
        &self,
        identifier: TokenId,
        threshold: u64,
    ) -> Result<usize, LedgerError> {
        let count = self.prune_where(identifier, |nonce| nonce < threshold)?;
        if count > 0 {
            info!(token_id = identifier, threshold, count, "[mu-03] Pruned confirmed transactions");
        }
        Ok(count)
    }

    fn prune_transactions_after(
        &self,
        identifier: TokenId,
        threshold: u64,
    ) -> Result<usize, LedgerError> {
        let count = self.prune_where(identifier, |nonce| nonce > threshold)?;
        if count > 0 {
            info!(token_id = identifier, threshold, count, "[mu-03] Pruned orphaned transactions");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::KVStoreError;
    use crate::ports::outbound::InMemoryKVStore;

    fn ledger() -> LedgerService<InMemoryKVStore> {
        LedgerService::new(InMemoryKVStore::new())
    }

    fn key(byte: u8) -> PublicKey {
        PublicKey([byte; 32])
    }

    fn tx(nonce: u64, identifier: TokenId) -> TransactionRecord {
        TransactionRecord::from_raw(nonce, identifier, 1_700_000_000_000 + nonce, &[nonce as u8])
    }

    /// Store whose batch writes always fail.
    struct FailingStore(InMemoryKVStore);

    impl KeyValueStore for FailingStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
            self.0.get(key)
        }
        fn atomic_batch_write(&mut self, _ops: Vec<BatchOperation>) -> Result<(), KVStoreError> {
            Err(KVStoreError::IOError {
                message: "read-only".to_string(),
            })
        }
        fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
            self.0.exists(key)
        }
        fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
            self.0.prefix_scan(prefix)
        }
    }

    #[test]
    fn test_save_and_lookup_by_every_identity() {
        let ledger = ledger();
        let record = DeviceRecord::new(key(1), 10, 0).with_dev_eui("eui-1");
        ledger.save_device(&record).unwrap();

        assert_eq!(ledger.get_device_by_public_key(&key(1)).unwrap(), Some(record.clone()));
        assert_eq!(ledger.get_device_by_dev_eui("eui-1").unwrap(), Some(record.clone()));
        assert_eq!(ledger.get_device_by_token_id(10).unwrap(), Some(record));
        assert!(ledger.get_device_by_dev_eui("eui-2").unwrap().is_none());
        assert_eq!(ledger.get_all_devices().unwrap().len(), 1);
    }

    #[test]
    fn test_save_is_upsert() {
        let ledger = ledger();
        ledger.save_device(&DeviceRecord::new(key(1), 10, 0)).unwrap();
        ledger.save_device(&DeviceRecord::new(key(1), 10, 7)).unwrap();
        assert_eq!(ledger.get_device_by_public_key(&key(1)).unwrap().unwrap().latest_nonce, 7);
        assert_eq!(ledger.get_all_devices().unwrap().len(), 1);
    }

    #[test]
    fn test_token_id_is_immutable_and_unique() {
        let ledger = ledger();
        ledger.save_device(&DeviceRecord::new(key(1), 10, 0)).unwrap();

        let err = ledger.save_device(&DeviceRecord::new(key(1), 11, 0)).unwrap_err();
        assert!(err.to_string().contains("immutable"));

        let err = ledger.save_device(&DeviceRecord::new(key(2), 10, 0)).unwrap_err();
        assert!(err.to_string().contains("another device"));
    }

    #[test]
    fn test_dev_eui_is_unique() {
        let ledger = ledger();
        ledger
            .save_device(&DeviceRecord::new(key(1), 10, 0).with_dev_eui("shared"))
            .unwrap();
        let err = ledger
            .save_device(&DeviceRecord::new(key(2), 11, 0).with_dev_eui("shared"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::StorageFailure(_)));
    }

    #[test]
    fn test_update_eui_moves_index() {
        let ledger = ledger();
        ledger
            .save_device(&DeviceRecord::new(key(1), 10, 0).with_dev_eui("old"))
            .unwrap();
        assert!(ledger.update_device_eui(&key(1), "new").unwrap());
        assert!(ledger.get_device_by_dev_eui("old").unwrap().is_none());
        assert_eq!(
            ledger.get_device_by_dev_eui("new").unwrap().unwrap().public_key,
            key(1)
        );
        assert!(!ledger.update_device_eui(&key(9), "x").unwrap());
    }

    #[test]
    fn test_update_nonce() {
        let ledger = ledger();
        ledger.save_device(&DeviceRecord::new(key(1), 10, 0)).unwrap();
        assert!(ledger.update_device_nonce(&key(1), 50).unwrap());
        assert_eq!(ledger.get_device_by_token_id(10).unwrap().unwrap().latest_nonce, 50);
        assert!(!ledger.update_device_nonce(&key(2), 1).unwrap());
    }

    #[test]
    fn test_raise_nonce_never_lowers() {
        let ledger = ledger();
        ledger.save_device(&DeviceRecord::new(key(1), 10, 42)).unwrap();

        assert!(!ledger.raise_device_nonce(&key(1), 41).unwrap());
        assert!(!ledger.raise_device_nonce(&key(1), 42).unwrap());
        assert_eq!(ledger.get_device_by_token_id(10).unwrap().unwrap().latest_nonce, 42);

        assert!(ledger.raise_device_nonce(&key(1), 50).unwrap());
        assert_eq!(ledger.get_device_by_token_id(10).unwrap().unwrap().latest_nonce, 50);
        assert!(!ledger.raise_device_nonce(&key(2), 1).unwrap());
    }

    #[test]
    fn test_delete_removes_indexes() {
        let ledger = ledger();
        ledger
            .save_device(&DeviceRecord::new(key(1), 10, 0).with_dev_eui("eui"))
            .unwrap();
        assert!(ledger.delete_device_by_public_key(&key(1)).unwrap());
        assert!(!ledger.delete_device_by_public_key(&key(1)).unwrap());
        assert!(ledger.get_device_by_dev_eui("eui").unwrap().is_none());
        assert!(ledger.get_device_by_token_id(10).unwrap().is_none());

        // token and eui are free again
        ledger
            .save_device(&DeviceRecord::new(key(2), 10, 0).with_dev_eui("eui"))
            .unwrap();
    }

    #[test]
    fn test_insert_duplicate_rejected() {
        let ledger = ledger();
        ledger.insert_transaction(&tx(6, 1)).unwrap();
        let err = ledger.insert_transaction(&tx(6, 1)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::DuplicateTransaction {
                nonce: 6,
                identifier: 1
            }
        );
        // same nonce, other device is fine
        ledger.insert_transaction(&tx(6, 2)).unwrap();
    }

    #[test]
    fn test_record_accepted_is_atomic_with_nonce() {
        let ledger = ledger();
        ledger.save_device(&DeviceRecord::new(key(1), 1, 5)).unwrap();

        ledger.record_accepted_transaction(&key(1), &tx(6, 1)).unwrap();
        assert_eq!(ledger.get_device_by_public_key(&key(1)).unwrap().unwrap().latest_nonce, 6);

        let err = ledger.record_accepted_transaction(&key(1), &tx(6, 1)).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateTransaction { .. }));
        assert_eq!(ledger.get_device_by_public_key(&key(1)).unwrap().unwrap().latest_nonce, 6);
        assert_eq!(ledger.get_all_transactions().unwrap().len(), 1);
    }

    #[test]
    fn test_record_accepted_requires_matching_device() {
        let ledger = ledger();
        assert!(ledger.record_accepted_transaction(&key(1), &tx(1, 1)).is_err());
        ledger.save_device(&DeviceRecord::new(key(1), 1, 0)).unwrap();
        assert!(ledger.record_accepted_transaction(&key(1), &tx(1, 2)).is_err());
        assert!(ledger.get_all_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_failed_batch_leaves_nothing_behind() {
        let mut inner = InMemoryKVStore::new();
        inner
            .atomic_batch_write(vec![BatchOperation::put(
                KeyPrefix::device_key(&key(1)),
                encode(&DeviceRecord::new(key(1), 1, 5)).unwrap(),
            )])
            .unwrap();
        let ledger = LedgerService::new(FailingStore(inner));

        let err = ledger.record_accepted_transaction(&key(1), &tx(6, 1)).unwrap_err();
        assert!(matches!(err, LedgerError::StorageFailure(_)));
        assert_eq!(ledger.get_device_by_public_key(&key(1)).unwrap().unwrap().latest_nonce, 5);
        assert!(ledger.get_transaction_by_nonce(6, 1).unwrap().is_none());
    }

    #[test]
    fn test_get_transaction_by_nonce() {
        let ledger = ledger();
        ledger.insert_transaction(&tx(3, 1)).unwrap();
        assert_eq!(ledger.get_transaction_by_nonce(3, 1).unwrap(), Some(tx(3, 1)));
        assert!(ledger.get_transaction_by_nonce(4, 1).unwrap().is_none());
    }

    #[test]
    fn test_prune_before_and_after() {
        let ledger = ledger();
        for n in 40..=55 {
            ledger.insert_transaction(&tx(n, 1)).unwrap();
        }
        ledger.insert_transaction(&tx(10, 2)).unwrap();

        assert_eq!(ledger.prune_transactions_before(1, 50).unwrap(), 10);
        let remaining: Vec<u64> = ledger
            .get_transactions_for(1)
            .unwrap()
            .iter()
            .map(|t| t.nonce)
            .collect();
        assert_eq!(remaining, (50..=55).collect::<Vec<_>>());

        assert_eq!(ledger.prune_transactions_after(1, 52).unwrap(), 3);
        assert_eq!(ledger.get_transactions_for(1).unwrap().len(), 3);

        // other devices untouched
        assert!(ledger.get_transaction_by_nonce(10, 2).unwrap().is_some());
        assert_eq!(ledger.prune_transactions_before(1, 0).unwrap(), 0);
    }
}
