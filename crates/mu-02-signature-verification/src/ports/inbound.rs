//! # Inbound Ports (Driving Ports / API)

use shared_types::PublicKey;

/// Uplink signature verification API.
///
/// Implementations must be thread-safe (`Send + Sync`) and must never
/// surface an error: any failure is reported as `false`.
pub trait SignatureVerificationApi: Send + Sync {
    /// Verify the signature carried in `raw_uplink` against `public_key`.
    fn verify(&self, raw_uplink: &[u8], public_key: &PublicKey) -> bool;

    /// Same as [`verify`](Self::verify) for a key in raw or SPKI byte form.
    fn verify_with_key_bytes(&self, raw_uplink: &[u8], public_key: &[u8]) -> bool;
}
