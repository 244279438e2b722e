//! # Scheduled Jobs
//!
//! - **prune-sync**: reconcile every known device with the chain
//! - **batch delivery**: prune-sync, then hand every pending transaction to
//!   the sinks as one scheduled batch
//!
//! Each job runs on its own interval until the shutdown channel flips. A
//! tick that is still running when the next one is due skips that tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mu_03_ledger::{LedgerApi, LedgerError};
use mu_04_chain_mirror::ChainMirrorApi;
use mu_07_distribution::{DistributionApi, DistributionBatch, DistributionReport};
use shared_types::DeviceIdentifier;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Outcome of one prune-sync round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Devices reconciled.
    pub synced: usize,
    /// Devices whose reconciliation failed.
    pub failed: usize,
}

/// Periodic work over the ledger.
pub struct Jobs {
    ledger: Arc<dyn LedgerApi>,
    mirror: Arc<dyn ChainMirrorApi>,
    distribution: Arc<dyn DistributionApi>,
}

impl Jobs {
    /// Create the job set.
    pub fn new(
        ledger: Arc<dyn LedgerApi>,
        mirror: Arc<dyn ChainMirrorApi>,
        distribution: Arc<dyn DistributionApi>,
    ) -> Self {
        Self {
            ledger,
            mirror,
            distribution,
        }
    }

    /// Prune-sync every device. One device failing does not stop the round.
    pub async fn prune_sync_all(&self) -> Result<SyncReport, LedgerError> {
        let mut report = SyncReport::default();
        for device in self.ledger.get_all_devices()? {
            match self
                .mirror
                .prune_and_sync_onchain(DeviceIdentifier::TokenId(device.token_id))
                .await
            {
                Ok(nonce) => {
                    debug!(token_id = device.token_id, nonce, "[jobs] Device synced");
                    report.synced += 1;
                }
                Err(e) => {
                    warn!(token_id = device.token_id, error = %e, "[jobs] Device sync failed");
                    report.failed += 1;
                }
            }
        }
        info!(synced = report.synced, failed = report.failed, "[jobs] Prune-sync complete");
        Ok(report)
    }

    /// Deliver every pending transaction. `None` when nothing is pending.
    pub async fn deliver_pending(&self) -> Result<Option<DistributionReport>, LedgerError> {
        self.prune_sync_all().await?;

        let pending = self.ledger.get_all_transactions()?;
        if pending.is_empty() {
            debug!("[jobs] No pending transactions to deliver");
            return Ok(None);
        }

        let batch = DistributionBatch::scheduled(&pending);
        info!(payloads = batch.len(), "[jobs] Delivering scheduled batch");
        let report = self.distribution.distribute(batch).await;
        if !report.all_delivered() {
            warn!(failed = ?report.failed, "[jobs] Scheduled batch not delivered everywhere");
        }
        Ok(Some(report))
    }

    /// Run `prune_sync_all` every `period`.
    pub async fn run_prune_sync(self: Arc<Self>, period: Duration, shutdown: watch::Receiver<bool>) {
        run_every("prune-sync", period, shutdown, || {
            let jobs = Arc::clone(&self);
            async move {
                if let Err(e) = jobs.prune_sync_all().await {
                    warn!(error = %e, "[jobs] Prune-sync could not list devices");
                }
            }
        })
        .await;
    }

    /// Run `deliver_pending` every `period`.
    pub async fn run_batch_delivery(
        self: Arc<Self>,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) {
        run_every("batch-delivery", period, shutdown, || {
            let jobs = Arc::clone(&self);
            async move {
                if let Err(e) = jobs.deliver_pending().await {
                    warn!(error = %e, "[jobs] Batch delivery could not read the ledger");
                }
            }
        })
        .await;
    }
}

async fn run_every<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(job = name, period_secs = period.as_secs(), "[jobs] Scheduled");

    loop {
        tokio::select! {
            _ = interval.tick() => tick().await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!(job = name, "[jobs] Stopped");
}
