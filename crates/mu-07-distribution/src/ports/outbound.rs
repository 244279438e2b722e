//! # Outbound Ports
//!
//! Delivery targets.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::batch::DistributionBatch;
use crate::domain::errors::SinkError;

/// A downstream target for committed transactions.
///
/// Production: `ArchiveSink`, `ProverSink`, `RelaySink` (adapters/)
/// Testing: `RecordingSink` (below)
#[async_trait]
pub trait DistributionSink: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Deliver one batch. Called again on failure per the retry policy.
    async fn deliver(&self, batch: &DistributionBatch) -> Result<(), SinkError>;
}

/// Sink that records batches and can be told to fail a number of times.
pub struct RecordingSink {
    name: String,
    batches: Mutex<Vec<DistributionBatch>>,
    failures_left: AtomicU32,
    attempts: AtomicU32,
}

impl RecordingSink {
    /// Sink that always succeeds.
    pub fn new(name: &str) -> Self {
        Self::failing(name, 0)
    }

    /// Sink whose first `failures` deliveries fail.
    pub fn failing(name: &str, failures: u32) -> Self {
        Self {
            name: name.to_string(),
            batches: Mutex::new(Vec::new()),
            failures_left: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        }
    }

    /// Batches delivered successfully.
    pub fn batches(&self) -> Vec<DistributionBatch> {
        self.batches.lock().clone()
    }

    /// Delivery attempts, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DistributionSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, batch: &DistributionBatch) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SinkError::Transport(format!("{} unavailable", self.name)));
        }
        self.batches.lock().push(batch.clone());
        Ok(())
    }
}
