//! # Ed25519 Uplink Verification
//!
//! The device signs the first 8 bytes of the uplink (nonce + energy); the
//! signature follows at bytes 8..72.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use subtle::ConstantTimeEq;

use super::errors::SignatureError;

/// DER prefix of an Ed25519 SubjectPublicKeyInfo structure.
pub const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Length of the signed region at the start of an uplink.
pub const SIGNED_LEN: usize = 8;

/// Length of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Extract the raw 32-byte key from either a raw key or an SPKI envelope.
pub fn unwrap_public_key(key: &[u8]) -> Result<[u8; 32], SignatureError> {
    let raw = match key.len() {
        32 => key,
        44 if bool::from(key[..12].ct_eq(&ED25519_SPKI_PREFIX[..])) => &key[12..],
        length => return Err(SignatureError::InvalidKeyEncoding { length }),
    };
    raw.try_into()
        .map_err(|_| SignatureError::InvalidKeyEncoding { length: raw.len() })
}

/// Wrap a raw key in the SPKI envelope.
pub fn wrap_public_key(raw: &[u8; 32]) -> [u8; 44] {
    let mut out = [0u8; 44];
    out[..12].copy_from_slice(&ED25519_SPKI_PREFIX);
    out[12..].copy_from_slice(raw);
    out
}

/// Verify the signature embedded in `uplink` against `public_key`.
pub fn verify_uplink(uplink: &[u8], public_key: &[u8]) -> Result<(), SignatureError> {
    if uplink.len() < SIGNED_LEN + SIGNATURE_LEN {
        return Err(SignatureError::TruncatedMessage {
            length: uplink.len(),
        });
    }

    let key_bytes = unwrap_public_key(public_key)?;
    let verifying_key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;

    let message = &uplink[..SIGNED_LEN];
    let sig_bytes: [u8; SIGNATURE_LEN] = uplink[SIGNED_LEN..SIGNED_LEN + SIGNATURE_LEN]
        .try_into()
        .map_err(|_| SignatureError::TruncatedMessage {
            length: uplink.len(),
        })?;
    let signature = Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed_uplink(key: &SigningKey, nonce: u32, energy: u32) -> Vec<u8> {
        let mut msg = Vec::new();
        msg.extend_from_slice(&nonce.to_be_bytes());
        msg.extend_from_slice(&energy.to_be_bytes());
        let sig = key.sign(&msg);
        msg.extend_from_slice(&sig.to_bytes());
        msg
    }

    #[test]
    fn test_valid_signature() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let uplink = signed_uplink(&key, 6, 1234);
        assert!(verify_uplink(&uplink, key.verifying_key().as_bytes()).is_ok());
    }

    #[test]
    fn test_spki_wrapped_key() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let uplink = signed_uplink(&key, 6, 1234);
        let wrapped = wrap_public_key(key.verifying_key().as_bytes());
        assert!(verify_uplink(&uplink, &wrapped).is_ok());
    }

    #[test]
    fn test_tampered_message_fails() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let mut uplink = signed_uplink(&key, 6, 1234);
        uplink[3] ^= 0x01;
        assert_eq!(
            verify_uplink(&uplink, key.verifying_key().as_bytes()),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let other = SigningKey::from_bytes(&[8u8; 32]);
        let uplink = signed_uplink(&key, 6, 1234);
        assert!(verify_uplink(&uplink, other.verifying_key().as_bytes()).is_err());
    }

    #[test]
    fn test_truncated_uplink() {
        let err = verify_uplink(&[0u8; 71], &[0u8; 32]).unwrap_err();
        assert_eq!(err, SignatureError::TruncatedMessage { length: 71 });
    }

    #[test]
    fn test_bad_key_length() {
        let err = unwrap_public_key(&[0u8; 31]).unwrap_err();
        assert_eq!(err, SignatureError::InvalidKeyEncoding { length: 31 });

        let mut bad_prefix = [0u8; 44];
        bad_prefix[0] = 0x31;
        assert!(unwrap_public_key(&bad_prefix).is_err());
    }

    #[test]
    fn test_extension_bytes_are_ignored() {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        let mut uplink = signed_uplink(&key, 1, 1);
        uplink.extend_from_slice(&[0xEE; 40]);
        assert!(verify_uplink(&uplink, key.verifying_key().as_bytes()).is_ok());
    }
}
