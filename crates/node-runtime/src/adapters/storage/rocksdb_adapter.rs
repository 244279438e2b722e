//! # RocksDB Storage Adapter
//!
//! Durable implementation of the ledger's `KeyValueStore` port.
//!
//! ## Features
//!
//! - Atomic batch writes (`WriteBatch`), so a transaction and its device
//!   watermark land together or not at all
//! - Snappy compression
//! - Bloom filters for point lookups
//! - Ordered iteration for prefix scans
//!
//! The ledger service serializes writers, so the handle is used without an
//! extra lock.

use std::path::{Path, PathBuf};

use mu_03_ledger::{BatchOperation, KVStoreError, KeyValueStore};
use rocksdb::{
    BlockBasedOptions, Cache, DBCompressionType, Direction, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};
use tracing::info;

/// RocksDB tuning.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Database directory.
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// fsync after each write (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/ledger"),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Small buffers, no fsync.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed key-value store.
pub struct RocksDbStore {
    db: DB,
    sync_writes: bool,
}

impl RocksDbStore {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(DBCompressionType::Snappy);

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| KVStoreError::IOError {
            message: format!("Failed to open RocksDB at {}: {}", config.path.display(), e),
        })?;
        info!(path = %config.path.display(), "[mu-03] RocksDB ledger opened");

        Ok(Self {
            db,
            sync_writes: config.sync_writes,
        })
    }

    /// Open with default tuning.
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, KVStoreError> {
        Self::open(RocksDbConfig {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        })
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.db.get(key).map_err(|e| KVStoreError::IOError {
            message: format!("RocksDB get failed: {}", e),
        })
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db
            .write_opt(batch, &write_opts)
            .map_err(|e| KVStoreError::IOError {
                message: format!("RocksDB batch write failed: {}", e),
            })
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.db
            .get_pinned(key)
            .map(|v| v.is_some())
            .map_err(|e| KVStoreError::IOError {
                message: format!("RocksDB exists check failed: {}", e),
            })
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let mut results = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|e| KVStoreError::IOError {
                message: format!("RocksDB scan failed: {}", e),
            })?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mu_03_ledger::{LedgerApi, LedgerService};
    use shared_types::{DeviceRecord, PublicKey, TransactionRecord};
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> RocksDbStore {
        RocksDbStore::open(RocksDbConfig::for_testing(dir.path())).unwrap()
    }

    #[test]
    fn test_batch_and_prefix_scan() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"a:2".to_vec(), b"two".to_vec()),
                BatchOperation::put(b"a:1".to_vec(), b"one".to_vec()),
                BatchOperation::put(b"b:1".to_vec(), b"other".to_vec()),
            ])
            .unwrap();
        store
            .atomic_batch_write(vec![BatchOperation::delete(b"a:2".to_vec())])
            .unwrap();

        let scanned = store.prefix_scan(b"a:").unwrap();
        assert_eq!(scanned, vec![(b"a:1".to_vec(), b"one".to_vec())]);
        assert!(store.exists(b"b:1").unwrap());
        assert!(!store.exists(b"a:2").unwrap());
    }

    #[test]
    fn test_ledger_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let key = PublicKey([9; 32]);
        {
            let ledger = LedgerService::new(open(&dir));
            ledger
                .save_device(&DeviceRecord::new(key, 4, 0).with_dev_eui("eui-4"))
                .unwrap();
            ledger
                .record_accepted_transaction(&key, &TransactionRecord::from_raw(1, 4, 1_000, &[0xaa]))
                .unwrap();
        }

        let ledger = LedgerService::new(open(&dir));
        let device = ledger.get_device_by_dev_eui("eui-4").unwrap().unwrap();
        assert_eq!(device.latest_nonce, 1);
        assert_eq!(ledger.get_transactions_for(4).unwrap().len(), 1);
    }
}
