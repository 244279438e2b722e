//! # Fan-out Service
//!
//! Runs every sink concurrently on its own task. Each sink gets its own
//! retry budget; one sink exhausting it does not affect the others.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{retry_with_backoff, RetryPolicy};
use tokio::task::JoinSet;
use tracing::{error, info};
use uplink_telemetry::SINK_DELIVERIES;

use crate::domain::batch::DistributionBatch;
use crate::ports::inbound::{DistributionApi, DistributionReport};
use crate::ports::outbound::DistributionSink;

/// Concurrent, failure-isolated delivery to a fixed set of sinks.
pub struct FanOut {
    sinks: Vec<Arc<dyn DistributionSink>>,
    policy: RetryPolicy,
}

impl FanOut {
    /// Fan-out over `sinks`, each retried per `policy`.
    pub fn new(sinks: Vec<Arc<dyn DistributionSink>>, policy: RetryPolicy) -> Self {
        Self { sinks, policy }
    }

    /// Number of configured sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True when no sink is configured.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

async fn deliver_one(
    sink: Arc<dyn DistributionSink>,
    batch: Arc<DistributionBatch>,
    policy: RetryPolicy,
) -> (String, bool) {
    let name = sink.name().to_string();
    let result = retry_with_backoff(&policy, &name, || sink.deliver(&batch)).await;
    let delivered = match result {
        Ok(()) => {
            SINK_DELIVERIES.with_label_values(&[&name, "ok"]).inc();
            true
        }
        Err(e) => {
            SINK_DELIVERIES.with_label_values(&[&name, "failed"]).inc();
            error!(sink = %name, error = %e, "[mu-07] Delivery abandoned");
            false
        }
    };
    (name, delivered)
}

#[async_trait]
impl DistributionApi for FanOut {
    async fn distribute(&self, batch: DistributionBatch) -> DistributionReport {
        let mut report = DistributionReport::default();
        if self.sinks.is_empty() {
            return report;
        }

        let batch = Arc::new(batch);
        let mut tasks = JoinSet::new();
        for sink in &self.sinks {
            tasks.spawn(deliver_one(Arc::clone(sink), Arc::clone(&batch), self.policy));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, true)) => report.delivered.push(name),
                Ok((name, false)) => report.failed.push(name),
                Err(e) => error!(error = %e, "[mu-07] Sink task aborted"),
            }
        }
        report.delivered.sort();
        report.failed.sort();

        info!(
            payloads = batch.len(),
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "[mu-07] Distribution round complete"
        );
        report
    }

    fn sink_names(&self) -> Vec<String> {
        self.sinks.iter().map(|s| s.name().to_string()).collect()
    }
}
