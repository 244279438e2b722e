//! # Inbound Ports (Driving Ports / API)

use shared_types::{DeviceRecord, PublicKey, TokenId, TransactionRecord};

use crate::domain::errors::LedgerError;

/// Ledger API used by the chain mirror, the registrar and the processor.
///
/// Every write is applied as one atomic batch; a failed call leaves no
/// partial state behind.
pub trait LedgerApi: Send + Sync {
    // =========================================================================
    // Devices
    // =========================================================================

    /// Insert or replace the record keyed by its public key.
    ///
    /// Fails with `StorageFailure` when the token id would change, or when
    /// the token id or transport identifier belongs to another device.
    fn save_device(&self, record: &DeviceRecord) -> Result<(), LedgerError>;

    /// Look up a device by public key.
    fn get_device_by_public_key(
        &self,
        public_key: &PublicKey,
    ) -> Result<Option<DeviceRecord>, LedgerError>;

    /// Look up a device by transport identifier.
    fn get_device_by_dev_eui(&self, dev_eui: &str) -> Result<Option<DeviceRecord>, LedgerError>;

    /// Look up a device by token id.
    fn get_device_by_token_id(&self, token_id: TokenId)
        -> Result<Option<DeviceRecord>, LedgerError>;

    /// Every device record.
    fn get_all_devices(&self) -> Result<Vec<DeviceRecord>, LedgerError>;

    /// Remove a device and its indexes. `true` iff a record was removed.
    fn delete_device_by_public_key(&self, public_key: &PublicKey) -> Result<bool, LedgerError>;

    /// Overwrite `latest_nonce`. `true` iff the device exists.
    fn update_device_nonce(&self, public_key: &PublicKey, nonce: u64) -> Result<bool, LedgerError>;

    /// Raise `latest_nonce` to `nonce` if it is currently lower. `true` iff raised.
    fn raise_device_nonce(&self, public_key: &PublicKey, nonce: u64) -> Result<bool, LedgerError>;

    /// Set the transport identifier. `true` iff the device exists.
    fn update_device_eui(&self, public_key: &PublicKey, dev_eui: &str)
        -> Result<bool, LedgerError>;

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Append a transaction. `DuplicateTransaction` if its key exists.
    fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), LedgerError>;

    /// Append a transaction and advance the owner's `latest_nonce` in one
    /// atomic write. On `DuplicateTransaction` nothing changes.
    fn record_accepted_transaction(
        &self,
        public_key: &PublicKey,
        record: &TransactionRecord,
    ) -> Result<(), LedgerError>;

    /// Every stored transaction, ordered by `(identifier, nonce)`.
    fn get_all_transactions(&self) -> Result<Vec<TransactionRecord>, LedgerError>;

    /// Transactions of one device, ordered by nonce.
    fn get_transactions_for(&self, identifier: TokenId)
        -> Result<Vec<TransactionRecord>, LedgerError>;

    /// Look up one transaction.
    fn get_transaction_by_nonce(
        &self,
        nonce: u64,
        identifier: TokenId,
    ) -> Result<Option<TransactionRecord>, LedgerError>;

    /// Delete the device's transactions with `nonce < threshold`. Returns the count.
    fn prune_transactions_before(
        &self,
        identifier: TokenId,
        threshold: u64,
    ) -> Result<usize, LedgerError>;

    /// Delete the device's transactions with `nonce > threshold`. Returns the count.
    fn prune_transactions_after(
        &self,
        identifier: TokenId,
        threshold: u64,
    ) -> Result<usize, LedgerError>;
}
