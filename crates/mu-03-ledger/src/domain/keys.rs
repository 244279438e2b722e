//! Key layout for the key-value store.
//!
//! Integers are big-endian so that prefix scans return transactions in
//! `(token, nonce)` order.

use shared_types::{PublicKey, TokenId};

/// Key prefixes for the key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    /// Device record: `dev:{public_key}` -> DeviceRecord
    Device,
    /// Transport identifier index: `eui:{dev_eui}` -> public key
    DevEuiIndex,
    /// Token id index: `tok:{token_id}` -> public key
    TokenIndex,
    /// Transaction: `txn:{token_id}{nonce}` -> TransactionRecord
    Transaction,
}

impl KeyPrefix {
    /// Get the byte prefix for this key type.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            KeyPrefix::Device => b"dev:",
            KeyPrefix::DevEuiIndex => b"eui:",
            KeyPrefix::TokenIndex => b"tok:",
            KeyPrefix::Transaction => b"txn:",
        }
    }

    /// Build a full key with the given suffix.
    pub fn key(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = self.as_bytes().to_vec();
        key.extend_from_slice(suffix);
        key
    }

    /// Device record key.
    pub fn device_key(public_key: &PublicKey) -> Vec<u8> {
        KeyPrefix::Device.key(public_key.as_bytes())
    }

    /// Transport identifier index key.
    pub fn dev_eui_key(dev_eui: &str) -> Vec<u8> {
        KeyPrefix::DevEuiIndex.key(dev_eui.as_bytes())
    }

    /// Token id index key.
    pub fn token_key(token_id: TokenId) -> Vec<u8> {
        KeyPrefix::TokenIndex.key(&token_id.to_be_bytes())
    }

    /// Transaction key.
    pub fn transaction_key(token_id: TokenId, nonce: u64) -> Vec<u8> {
        let mut key = Self::transactions_for(token_id);
        key.extend_from_slice(&nonce.to_be_bytes());
        key
    }

    /// Prefix covering every transaction of one device.
    pub fn transactions_for(token_id: TokenId) -> Vec<u8> {
        KeyPrefix::Transaction.key(&token_id.to_be_bytes())
    }

    /// Nonce encoded in a transaction key.
    pub fn nonce_from_transaction_key(key: &[u8]) -> Option<u64> {
        let start = KeyPrefix::Transaction.as_bytes().len() + 8;
        let bytes: [u8; 8] = key.get(start..start + 8)?.try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_key_roundtrip_nonce() {
        let key = KeyPrefix::transaction_key(7, 300);
        assert!(key.starts_with(&KeyPrefix::transactions_for(7)));
        assert_eq!(KeyPrefix::nonce_from_transaction_key(&key), Some(300));
    }

    #[test]
    fn test_transaction_keys_sort_by_nonce() {
        let a = KeyPrefix::transaction_key(1, 9);
        let b = KeyPrefix::transaction_key(1, 10);
        let c = KeyPrefix::transaction_key(2, 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_short_key_has_no_nonce() {
        assert_eq!(KeyPrefix::nonce_from_transaction_key(b"txn:"), None);
    }
}
