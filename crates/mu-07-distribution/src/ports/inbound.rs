//! # Inbound Ports (Driving Ports / API)

use async_trait::async_trait;

use crate::domain::batch::DistributionBatch;

/// Result of one distribution round, by sink name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionReport {
    /// Sinks that accepted the batch.
    pub delivered: Vec<String>,
    /// Sinks that exhausted their retries.
    pub failed: Vec<String>,
}

impl DistributionReport {
    /// True when every sink accepted the batch.
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fan-out entry point. Never fails; per-sink outcomes are reported.
#[async_trait]
pub trait DistributionApi: Send + Sync {
    /// Deliver the batch to every configured sink.
    async fn distribute(&self, batch: DistributionBatch) -> DistributionReport;

    /// Names of the configured sinks.
    fn sink_names(&self) -> Vec<String>;
}
