//! # Uplink Processor Service
//!
//! ```text
//! envelope ─▶ lock ─▶ decode ─▶ resolve key ─▶ verify ─▶ register/refresh
//!                                                              │
//!   downlink ◀─ encode ◀─ is_on ◀─ fan-out ◀─ commit ◀─ nonce check ◀─ epoch sync
//! ```
//!
//! The device lock is held from envelope parse to response; fan-out runs on
//! background tasks after the commit and never holds the lock.

use std::sync::Arc;

use async_trait::async_trait;
use mu_01_wire_codec::{decode, encode, DecodedPayload, ResponseState};
use mu_02_signature_verification::SignatureVerificationApi;
use mu_03_ledger::LedgerApi;
use mu_04_chain_mirror::ChainMirrorApi;
use mu_05_device_registrar::{DeviceRegistrarApi, Registration};
use mu_07_distribution::{DistributionApi, DistributionBatch};
use shared_bus::{DropReason, LifecycleBus, LifecycleQuery, UplinkEvent};
use shared_types::{
    DeviceIdentifier, DeviceRecord, PublicKey, TimeSource, TokenId, TransactionRecord,
    TransportEnvelope,
};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn, Instrument, Span};
use uplink_telemetry::{
    record_device, uplink_span, HistogramTimer, PIPELINE_DURATION, TRANSACTIONS_ACCEPTED,
    UPLINKS_DROPPED, UPLINKS_RECEIVED, UPLINKS_RESPONDED,
};

use crate::domain::config::ProcessorConfig;
use crate::domain::errors::UplinkError;
use crate::domain::outcome::MessageOutcome;
use crate::lock_registry::DeviceLockRegistry;
use crate::ports::inbound::UplinkProcessorApi;
use crate::ports::outbound::DownlinkQueue;

/// Everything the pipeline calls out to.
pub struct Collaborators {
    /// Device and transaction store.
    pub ledger: Arc<dyn LedgerApi>,
    /// Chain reconciliation and billing reads.
    pub mirror: Arc<dyn ChainMirrorApi>,
    /// Device resolution.
    pub registrar: Arc<dyn DeviceRegistrarApi>,
    /// Signature checks.
    pub verifier: Arc<dyn SignatureVerificationApi>,
    /// Post-commit fan-out.
    pub distribution: Arc<dyn DistributionApi>,
    /// Response channel.
    pub downlink: Arc<dyn DownlinkQueue>,
    /// Lifecycle observers.
    pub bus: Arc<LifecycleBus>,
    /// Clock for `received_at`.
    pub clock: Arc<dyn TimeSource>,
}

/// The uplink pipeline.
pub struct UplinkProcessor {
    deps: Collaborators,
    locks: DeviceLockRegistry,
    config: ProcessorConfig,
    background: TaskTracker,
}

impl UplinkProcessor {
    /// Create a processor owning `locks`.
    pub fn new(deps: Collaborators, locks: DeviceLockRegistry, config: ProcessorConfig) -> Self {
        Self {
            deps,
            locks,
            config,
            background: TaskTracker::new(),
        }
    }

    /// The lock registry.
    pub fn locks(&self) -> &DeviceLockRegistry {
        &self.locks
    }

    /// Pipeline settings.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Wait until every fan-out task spawned so far has finished.
    pub async fn wait_for_distribution(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    async fn drop_message(&self, dev_eui: Option<String>, reason: DropReason) -> MessageOutcome {
        UPLINKS_DROPPED.with_label_values(&[reason.as_str()]).inc();
        match reason {
            DropReason::DeviceBusy => {
                debug!(dev_eui = ?dev_eui, "[mu-06] Device busy, message dropped")
            }
            _ => warn!(dev_eui = ?dev_eui, reason = reason.as_str(), "[mu-06] Message dropped"),
        }
        self.deps
            .bus
            .notify(UplinkEvent::MessageDropped { dev_eui, reason })
            .await;
        MessageOutcome::Dropped(reason)
    }

    async fn dispatch(&self, raw: &[u8]) -> MessageOutcome {
        let envelope = match TransportEnvelope::parse(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "[mu-06] Unparseable envelope");
                return self.drop_message(None, DropReason::InvalidEnvelope).await;
            }
        };
        let dev_eui = match envelope.dev_eui() {
            Ok(dev_eui) => dev_eui.to_string(),
            Err(_) => {
                return self
                    .drop_message(None, DropReason::MissingDeviceIdentifier)
                    .await
            }
        };
        let Some(guard) = self.locks.try_acquire(&dev_eui) else {
            return self.drop_message(Some(dev_eui), DropReason::DeviceBusy).await;
        };

        let outcome = async {
            let _timer = HistogramTimer::new(&PIPELINE_DURATION);
            match self.process(&envelope, &dev_eui).await {
                Ok((downlink, accepted_nonce)) => {
                    UPLINKS_RESPONDED.inc();
                    MessageOutcome::Responded {
                        downlink,
                        accepted_nonce,
                    }
                }
                Err(e) => {
                    UPLINKS_DROPPED.with_label_values(&[e.kind()]).inc();
                    match &e {
                        UplinkError::Ledger(_) | UplinkError::Chain(_) | UplinkError::Downlink(_) => {
                            error!(kind = e.kind(), error = %e, "[mu-06] Uplink failed")
                        }
                        _ => warn!(kind = e.kind(), error = %e, "[mu-06] Uplink rejected"),
                    }
                    self.deps
                        .bus
                        .notify(UplinkEvent::MessageFailed {
                            dev_eui: dev_eui.clone(),
                            error: e.to_string(),
                        })
                        .await;
                    MessageOutcome::Failed(e)
                }
            }
        }
        .instrument(uplink_span(&dev_eui))
        .await;

        drop(guard);
        self.deps
            .bus
            .notify(UplinkEvent::DeviceUnlocked { dev_eui })
            .await;
        outcome
    }

    async fn process(
        &self,
        envelope: &TransportEnvelope,
        dev_eui: &str,
    ) -> Result<(Vec<u8>, Option<u64>), UplinkError> {
        let raw = envelope.payload()?;
        let decoded = decode(&raw)?;

        let (public_key, carried) = match decoded.public_key() {
            Some(key) => (key?, true),
            None => (self.deps.registrar.resolve_by_dev_eui(dev_eui)?.public_key, false),
        };

        if !self.deps.verifier.verify(&raw, &public_key) {
            return Err(UplinkError::InvalidSignature {
                public_key: public_key.to_hex(),
            });
        }

        if carried {
            let registration = self
                .deps
                .registrar
                .register_or_refresh(&public_key, dev_eui)
                .await?;
            if registration.is_new() {
                self.deps
                    .bus
                    .notify(UplinkEvent::DeviceRegistered {
                        dev_eui: dev_eui.to_string(),
                        token_id: registration.record().token_id,
                        public_key,
                        rotated: matches!(registration, Registration::Rotated { .. }),
                    })
                    .await;
            }
        }

        let mut device = self.load_device(&public_key, dev_eui)?;
        record_device(&Span::current(), device.token_id, &public_key.to_hex());
        let incoming = u64::from(decoded.nonce);

        if device.latest_nonce == 0 && incoming == 0 {
            info!("[mu-06] Bootstrap heartbeat");
            let is_on = self.compute_is_on(device.token_id).await;
            let downlink = self
                .respond(dev_eui, ResponseState::with_nonce(is_on, 0), &decoded)
                .await?;
            return Ok((downlink, None));
        }

        if self.config.is_sync_point(device.latest_nonce) {
            let remote_nonce = self
                .deps
                .mirror
                .prune_and_sync_onchain(DeviceIdentifier::TokenId(device.token_id))
                .await?;
            info!(remote_nonce, "[mu-06] Sync epoch reached");
            self.deps
                .bus
                .notify(UplinkEvent::SyncEpochReached {
                    token_id: device.token_id,
                    remote_nonce,
                })
                .await;
            device = self.load_device(&public_key, dev_eui)?;
        }

        let expected = device.latest_nonce + 1;
        if incoming != expected && incoming != 0 {
            return Err(UplinkError::NonceMismatch {
                expected,
                received: incoming,
            });
        }

        let accepted_nonce = if incoming == expected {
            self.commit(&public_key, &device, incoming, &raw).await?;
            Some(incoming)
        } else {
            None
        };

        let is_on = self.compute_is_on(device.token_id).await;
        let state = match accepted_nonce {
            Some(_) => ResponseState::new(is_on),
            None => ResponseState::with_nonce(
                is_on,
                u32::try_from(device.latest_nonce).unwrap_or(u32::MAX),
            ),
        };
        let downlink = self.respond(dev_eui, state, &decoded).await?;
        Ok((downlink, accepted_nonce))
    }

    fn load_device(&self, public_key: &PublicKey, dev_eui: &str) -> Result<DeviceRecord, UplinkError> {
        self.deps
            .ledger
            .get_device_by_public_key(public_key)?
            .ok_or_else(|| UplinkError::DeviceNotFound {
                dev_eui: dev_eui.to_string(),
            })
    }

    async fn commit(
        &self,
        public_key: &PublicKey,
        device: &DeviceRecord,
        nonce: u64,
        raw: &[u8],
    ) -> Result<(), UplinkError> {
        let record =
            TransactionRecord::from_raw(nonce, device.token_id, self.deps.clock.now_millis(), raw);
        self.deps
            .ledger
            .record_accepted_transaction(public_key, &record)?;
        TRANSACTIONS_ACCEPTED.inc();
        info!(nonce, "[mu-06] Transaction accepted");
        self.deps
            .bus
            .notify(UplinkEvent::TransactionAccepted {
                token_id: device.token_id,
                nonce,
            })
            .await;

        match self.deps.ledger.get_all_transactions() {
            Ok(pending) => {
                let batch = DistributionBatch::accepted(device.token_id, nonce, &pending);
                let distribution = Arc::clone(&self.deps.distribution);
                self.background.spawn(
                    async move {
                        distribution.distribute(batch).await;
                    }
                    .in_current_span(),
                );
            }
            Err(e) => warn!(error = %e, "[mu-06] Pending transactions unavailable, fan-out skipped"),
        }
        Ok(())
    }

    async fn billing_state(&self, token_id: TokenId) -> Result<bool, UplinkError> {
        let (revenue, owed) = tokio::join!(
            self.deps.mirror.get_cross_chain_revenue(token_id),
            self.deps.mirror.get_amount_owed(token_id),
        );
        Ok(revenue? >= owed?)
    }

    async fn compute_is_on(&self, token_id: TokenId) -> bool {
        let computed = match self.billing_state(token_id).await {
            Ok(is_on) => is_on,
            Err(e) => {
                warn!(error = %e, "[mu-06] Billing state unavailable, defaulting to on");
                true
            }
        };
        let is_on = self
            .deps
            .bus
            .query(LifecycleQuery::IsOnStateCompute { token_id }, computed)
            .await;
        self.deps
            .bus
            .notify(UplinkEvent::StateComputed { token_id, is_on })
            .await;
        is_on
    }

    async fn respond(
        &self,
        dev_eui: &str,
        state: ResponseState,
        decoded: &DecodedPayload,
    ) -> Result<Vec<u8>, UplinkError> {
        let bytes = encode(&state, decoded.latitude(), decoded.longitude());
        self.deps.downlink.enqueue(dev_eui, &bytes).await?;
        debug!(is_on = state.is_on, nonce = ?state.nonce, "[mu-06] Response enqueued");
        self.deps
            .bus
            .notify(UplinkEvent::DownlinkEnqueued {
                dev_eui: dev_eui.to_string(),
                bytes: bytes.len(),
            })
            .await;
        Ok(bytes)
    }
}

#[async_trait]
impl UplinkProcessorApi for UplinkProcessor {
    async fn handle_message(&self, raw: &[u8]) -> MessageOutcome {
        UPLINKS_RECEIVED.inc();
        self.deps
            .bus
            .notify(UplinkEvent::MessageReceived { bytes: raw.len() })
            .await;
        let outcome = self.dispatch(raw).await;
        self.deps.bus.notify(UplinkEvent::ProcessingComplete).await;
        outcome
    }
}
