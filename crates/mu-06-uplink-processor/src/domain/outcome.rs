//! What happened to one inbound message.

use shared_bus::DropReason;

use crate::domain::errors::UplinkError;

/// Result of `handle_message`. Informational only; nothing is propagated.
#[derive(Debug)]
pub enum MessageOutcome {
    /// Discarded before the pipeline ran.
    Dropped(DropReason),
    /// A response was queued for the device.
    Responded {
        /// Encoded downlink bytes.
        downlink: Vec<u8>,
        /// Nonce committed by this message, if any.
        accepted_nonce: Option<u64>,
    },
    /// The pipeline stopped with an error; no response was sent.
    Failed(UplinkError),
}

impl MessageOutcome {
    /// True when a transaction was committed.
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            MessageOutcome::Responded {
                accepted_nonce: Some(_),
                ..
            }
        )
    }

    /// The queued response, if any.
    pub fn downlink(&self) -> Option<&[u8]> {
        match self {
            MessageOutcome::Responded { downlink, .. } => Some(downlink),
            _ => None,
        }
    }

    /// The pipeline error, if any.
    pub fn error(&self) -> Option<&UplinkError> {
        match self {
            MessageOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}
