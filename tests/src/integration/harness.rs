//! # Pipeline Harness
//!
//! The real ledger, chain mirror, registrar, processor and fan-out wired
//! against a mock chain, two recording sinks and a downlink queue that can
//! be held to keep a device lock busy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use mu_02_signature_verification::UplinkSignatureVerifier;
use mu_03_ledger::{InMemoryKVStore, LedgerApi, LedgerService};
use mu_04_chain_mirror::{ChainMirror, MockChainReader};
use mu_05_device_registrar::DeviceRegistrar;
use mu_06_uplink_processor::{
    Collaborators, DeviceLockRegistry, DownlinkError, DownlinkQueue, MessageOutcome,
    ProcessorConfig, RecordingDownlink, UplinkProcessor, UplinkProcessorApi,
};
use mu_07_distribution::{DistributionBatch, DistributionSink, FanOut, RecordingSink};
use shared_bus::LifecycleBus;
use shared_types::{
    DeviceRecord, FixedTimeSource, PublicKey, RetryPolicy, TokenId, TransactionRecord,
    TransportEnvelope,
};
use tokio::sync::{Notify, Semaphore};

/// Transport identifier of the harness device.
pub const EUI: &str = "0102030405060708";

/// Token id the mock chain assigns to the harness device.
pub const TOKEN_ID: TokenId = 1;

/// Receipt time stamped on every committed transaction.
pub const NOW_MILLIS: u64 = 1_700_000_000_000;

// =============================================================================
// DOWNLINK GATE
// =============================================================================

/// Downlink queue that records every enqueue and, while held, parks each
/// caller until released.
pub struct GatedDownlink {
    inner: RecordingDownlink,
    held: AtomicBool,
    entered: Notify,
    release: Semaphore,
}

impl Default for GatedDownlink {
    fn default() -> Self {
        Self {
            inner: RecordingDownlink::default(),
            held: AtomicBool::default(),
            entered: Notify::default(),
            release: Semaphore::new(0),
        }
    }
}

impl GatedDownlink {
    /// Park subsequent enqueues.
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    /// Stop parking and let one parked enqueue through.
    pub fn open(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.release.add_permits(1);
    }

    /// Resolves once an enqueue is parked.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Everything enqueued so far.
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.inner.sent()
    }
}

#[async_trait]
impl DownlinkQueue for GatedDownlink {
    async fn enqueue(&self, dev_eui: &str, payload: &[u8]) -> Result<(), DownlinkError> {
        if self.held.load(Ordering::SeqCst) {
            self.entered.notify_one();
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }
        self.inner.enqueue(dev_eui, payload).await
    }
}

// =============================================================================
// HARNESS
// =============================================================================

/// A fully wired pipeline for one signing device.
pub struct Harness {
    pub ledger: Arc<LedgerService<InMemoryKVStore>>,
    pub chain: Arc<MockChainReader>,
    pub mirror: Arc<ChainMirror>,
    pub downlink: Arc<GatedDownlink>,
    pub archive: Arc<RecordingSink>,
    pub prover: Arc<RecordingSink>,
    pub bus: Arc<LifecycleBus>,
    pub processor: Arc<UplinkProcessor>,
    pub signer: SigningKey,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ProcessorConfig::default())
    }

    pub fn with_config(config: ProcessorConfig) -> Self {
        let ledger = Arc::new(LedgerService::new(InMemoryKVStore::new()));
        let chain = Arc::new(MockChainReader::new());
        let mirror = Arc::new(ChainMirror::new(
            ledger.clone(),
            chain.clone(),
            RetryPolicy::once(),
        ));
        let registrar = Arc::new(DeviceRegistrar::new(ledger.clone(), mirror.clone()));
        let downlink = Arc::new(GatedDownlink::default());
        let archive = Arc::new(RecordingSink::new("archive"));
        let prover = Arc::new(RecordingSink::new("prover"));
        let distribution = Arc::new(FanOut::new(
            vec![
                archive.clone() as Arc<dyn DistributionSink>,
                prover.clone() as Arc<dyn DistributionSink>,
            ],
            RetryPolicy::once(),
        ));
        let bus = Arc::new(LifecycleBus::new());
        let processor = Arc::new(UplinkProcessor::new(
            Collaborators {
                ledger: ledger.clone(),
                mirror: mirror.clone(),
                registrar,
                verifier: Arc::new(UplinkSignatureVerifier::new()),
                distribution,
                downlink: downlink.clone(),
                bus: bus.clone(),
                clock: Arc::new(FixedTimeSource::new(NOW_MILLIS)),
            },
            DeviceLockRegistry::new(),
            config,
        ));

        let signer = SigningKey::from_bytes(&[42u8; 32]);
        chain.set_token_id(PublicKey(signer.verifying_key().to_bytes()), TOKEN_ID);

        Self {
            ledger,
            chain,
            mirror,
            downlink,
            archive,
            prover,
            bus,
            processor,
            signer,
        }
    }

    pub fn key(&self) -> PublicKey {
        PublicKey(self.signer.verifying_key().to_bytes())
    }

    /// Register the device locally as if it had already been seen.
    pub fn seed_device(&self, latest_nonce: u64) {
        self.ledger
            .save_device(&DeviceRecord::new(self.key(), TOKEN_ID, latest_nonce).with_dev_eui(EUI))
            .unwrap();
    }

    /// Store transactions directly, leaving the watermark untouched.
    pub fn seed_transactions(&self, nonces: impl IntoIterator<Item = u64>) {
        for nonce in nonces {
            self.ledger
                .insert_transaction(&TransactionRecord::from_raw(
                    nonce,
                    TOKEN_ID,
                    NOW_MILLIS,
                    &nonce.to_be_bytes(),
                ))
                .unwrap();
        }
    }

    /// Signed 72-byte uplink without an extension block.
    pub fn uplink(&self, nonce: u32, energy_raw: u32) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(72);
        bytes.extend_from_slice(&nonce.to_be_bytes());
        bytes.extend_from_slice(&energy_raw.to_be_bytes());
        let signature = self.signer.sign(&bytes);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes
    }

    /// Signed uplink carrying voltage and the device public key.
    pub fn identifying_uplink(&self, nonce: u32) -> Vec<u8> {
        let mut bytes = self.uplink(nonce, 2_000_000);
        bytes.extend_from_slice(&2_305u16.to_be_bytes());
        bytes.extend_from_slice(self.key().as_bytes());
        bytes
    }

    pub fn message(&self, payload: &[u8]) -> Vec<u8> {
        TransportEnvelope::new(EUI, payload).to_bytes().unwrap()
    }

    pub async fn send(&self, payload: &[u8]) -> MessageOutcome {
        self.processor.handle_message(&self.message(payload)).await
    }

    pub fn latest_nonce(&self) -> u64 {
        self.ledger
            .get_device_by_token_id(TOKEN_ID)
            .unwrap()
            .map(|d| d.latest_nonce)
            .unwrap_or_default()
    }

    pub fn stored_nonces(&self) -> Vec<u64> {
        self.ledger
            .get_transactions_for(TOKEN_ID)
            .unwrap()
            .iter()
            .map(|t| t.nonce)
            .collect()
    }

    /// Batches each sink has received, after pending fan-out settles.
    pub async fn delivered(&self) -> (Vec<DistributionBatch>, Vec<DistributionBatch>) {
        self.processor.wait_for_distribution().await;
        (self.archive.batches(), self.prover.batches())
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
