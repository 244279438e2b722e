//! Verifier entries and the 20-byte chain address.

use std::fmt;

use super::errors::ChainError;

/// 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Parse a hex address, with or without a `0x` prefix.
    pub fn from_hex(value: &str) -> Result<Self, ChainError> {
        let stripped = value.strip_prefix("0x").unwrap_or(value);
        let bytes = hex::decode(stripped)
            .map_err(|e| ChainError::InvalidResponse(format!("address {}: {}", value, e)))?;
        let raw: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ChainError::InvalidResponse(format!("address {} is not 20 bytes", value)))?;
        Ok(Self(raw))
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// True for the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

/// One entry of the verifier registry, with its resolved address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierInfo {
    /// Registry name, resolved through the name service.
    pub ens_name: String,
    /// Contract the verifier reads revenue from.
    pub target_address: Address,
    /// Address `ens_name` resolved to.
    pub verifier_address: Address,
}
