//! The unit of work handed to every sink.

use shared_types::{build_batch_payload, BatchTransactionPayload, TokenId, TransactionRecord};

/// What caused a distribution round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A transaction was just committed by the pipeline.
    Accepted {
        /// Device token id.
        token_id: TokenId,
        /// Committed nonce.
        nonce: u64,
    },
    /// A periodic delivery job.
    Scheduled,
}

/// Pending transactions plus the reason they are being delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionBatch {
    /// Why this round runs.
    pub trigger: Trigger,
    /// Every pending transaction, ordered by `(m3ter_id, nonce)`.
    pub payloads: Vec<BatchTransactionPayload>,
    current: Option<usize>,
}

impl DistributionBatch {
    /// Batch following a commit. `records` must contain the committed one.
    pub fn accepted(token_id: TokenId, nonce: u64, records: &[TransactionRecord]) -> Self {
        let current = records
            .iter()
            .position(|r| r.identifier == token_id && r.nonce == nonce);
        Self {
            trigger: Trigger::Accepted { token_id, nonce },
            payloads: build_batch_payload(records),
            current,
        }
    }

    /// Batch for a scheduled delivery.
    pub fn scheduled(records: &[TransactionRecord]) -> Self {
        Self {
            trigger: Trigger::Scheduled,
            payloads: build_batch_payload(records),
            current: None,
        }
    }

    /// The transaction that triggered this round, if any.
    pub fn current(&self) -> Option<&BatchTransactionPayload> {
        self.current.and_then(|i| self.payloads.get(i))
    }

    /// Number of payloads.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// True when there is nothing to deliver.
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}
