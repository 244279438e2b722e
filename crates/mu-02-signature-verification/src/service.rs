//! # Signature Verification Service
//!
//! Implements [`SignatureVerificationApi`] on top of the Ed25519 domain logic.

use shared_types::PublicKey;
use tracing::debug;

use crate::domain::ed25519;
use crate::ports::inbound::SignatureVerificationApi;

/// Stateless Ed25519 verifier for device uplinks.
#[derive(Debug, Default, Clone, Copy)]
pub struct UplinkSignatureVerifier;

impl UplinkSignatureVerifier {
    /// Create a verifier.
    pub fn new() -> Self {
        Self
    }
}

impl SignatureVerificationApi for UplinkSignatureVerifier {
    fn verify(&self, raw_uplink: &[u8], public_key: &PublicKey) -> bool {
        self.verify_with_key_bytes(raw_uplink, public_key.as_bytes())
    }

    fn verify_with_key_bytes(&self, raw_uplink: &[u8], public_key: &[u8]) -> bool {
        match ed25519::verify_uplink(raw_uplink, public_key) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "[mu-02] Signature rejected");
                false
            }
        }
    }
}
