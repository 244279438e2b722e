//! # Core Domain Entities
//!
//! Records persisted by the ledger and the identifiers used to look them up.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::IdentityError;

/// Identifier of a device on the external chain.
pub type TokenId = u64;

/// Ed25519 public key of a device. The canonical device identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Parse a hex key, with or without a `0x` prefix.
    pub fn from_hex(value: &str) -> Result<Self, IdentityError> {
        let stripped = value.strip_prefix("0x").unwrap_or(value);
        let bytes = hex::decode(stripped).map_err(|e| IdentityError::InvalidPublicKey {
            reason: e.to_string(),
        })?;
        Self::from_slice(&bytes)
    }

    /// Build a key from exactly 32 raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentityError> {
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidPublicKey {
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            })?;
        Ok(Self(key))
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// One physical metering device and its sync cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Canonical identity key; unique.
    pub public_key: PublicKey,
    /// Transport-layer identifier; unique when present.
    pub dev_eui: Option<String>,
    /// Identifier on the chain; immutable once assigned.
    pub token_id: TokenId,
    /// Highest nonce durably accepted for this device.
    pub latest_nonce: u64,
}

impl DeviceRecord {
    /// Create a record with no transport identifier yet.
    pub fn new(public_key: PublicKey, token_id: TokenId, latest_nonce: u64) -> Self {
        Self {
            public_key,
            dev_eui: None,
            token_id,
            latest_nonce,
        }
    }

    /// Attach a transport identifier.
    pub fn with_dev_eui(mut self, dev_eui: impl Into<String>) -> Self {
        self.dev_eui = Some(dev_eui.into());
        self
    }
}

/// One accepted uplink. Append-only; removed only by pruning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Device-local sequence number.
    pub nonce: u64,
    /// Owning device's token id.
    pub identifier: TokenId,
    /// Local acceptance time, milliseconds since the Unix epoch.
    pub received_at: u64,
    /// Exact wire bytes of the payload, lowercase hex.
    pub raw: String,
}

impl TransactionRecord {
    /// Build a record from the raw payload bytes.
    pub fn from_raw(nonce: u64, identifier: TokenId, received_at: u64, raw: &[u8]) -> Self {
        Self {
            nonce,
            identifier,
            received_at,
            raw: hex::encode(raw),
        }
    }

    /// Decode `raw` back into bytes.
    pub fn raw_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.raw)
    }
}

/// A device reference accepted by lookups that take either identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceIdentifier {
    /// Chain token id.
    TokenId(TokenId),
    /// Device public key.
    PublicKey(PublicKey),
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceIdentifier::TokenId(id) => write!(f, "token:{}", id),
            DeviceIdentifier::PublicKey(key) => write!(f, "key:{}", key),
        }
    }
}

impl From<TokenId> for DeviceIdentifier {
    fn from(id: TokenId) -> Self {
        DeviceIdentifier::TokenId(id)
    }
}

impl From<PublicKey> for DeviceIdentifier {
    fn from(key: PublicKey) -> Self {
        DeviceIdentifier::PublicKey(key)
    }
}

/// One entry of the batch handed to distribution sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTransactionPayload {
    /// Token id of the device.
    pub m3ter_id: TokenId,
    /// Raw payload hex.
    pub message: String,
}

impl From<&TransactionRecord> for BatchTransactionPayload {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            m3ter_id: record.identifier,
            message: record.raw.clone(),
        }
    }
}

/// Build the sink batch from ledger records, preserving order.
pub fn build_batch_payload(records: &[TransactionRecord]) -> Vec<BatchTransactionPayload> {
    records.iter().map(BatchTransactionPayload::from).collect()
}
