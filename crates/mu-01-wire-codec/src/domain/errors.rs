//! Codec error types.

use thiserror::Error;

/// Errors raised while decoding an uplink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer bytes than the fixed header and signature.
    #[error("Malformed payload: {length} bytes, need at least {minimum}")]
    MalformedPayload { length: usize, minimum: usize },
}
