//! # Subsystem Container
//!
//! Holds every subsystem instance and wires them together.
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: Ledger, Signature Verification, Lifecycle Bus (+ event logger)
//! Level 1: Chain Mirror (ledger + chain reader)
//! Level 2: Device Registrar (ledger + mirror), Distribution (sinks)
//! Level 3: Uplink Processor (all of the above + downlink)
//! Level 4: Scheduled Jobs
//! ```
//!
//! The chain reader and the downlink queue are injected so the container
//! can be assembled against mocks.

use std::sync::Arc;

use mu_02_signature_verification::UplinkSignatureVerifier;
use mu_03_ledger::{InMemoryKVStore, LedgerApi, LedgerService};
use mu_04_chain_mirror::{ChainMirror, ChainMirrorApi, ChainMirrorError, ChainReader};
use mu_05_device_registrar::{DeviceRegistrar, DeviceRegistrarApi};
use mu_06_uplink_processor::{
    Collaborators, DeviceLockRegistry, DownlinkQueue, ProcessorConfig, UplinkProcessor,
};
use mu_07_distribution::{
    ArchiveSink, DistributionApi, DistributionSink, FanOut, ProverSink, RelaySink,
};
use shared_bus::LifecycleBus;
use shared_types::{SystemTimeSource, TimeSource};
use thiserror::Error;
use tracing::{info, instrument};

use crate::container::config::{
    DistributionConfig, LedgerBackend, LedgerConfig, NodeConfig, SinkKind,
};
use crate::jobs::Jobs;
use crate::observers::EventLogObserver;

/// Startup failures while assembling subsystems.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The ledger could not be opened.
    #[error("Ledger unavailable: {0}")]
    Ledger(String),

    /// The verifier cache could not be built.
    #[error("Verifier cache bootstrap failed: {0}")]
    Verifiers(#[from] ChainMirrorError),
}

/// Central container holding all subsystem instances.
pub struct SubsystemContainer {
    /// Device and transaction store.
    pub ledger: Arc<dyn LedgerApi>,
    /// Chain reconciliation and billing reads.
    pub mirror: Arc<ChainMirror>,
    /// Device resolution and registration.
    pub registrar: Arc<DeviceRegistrar>,
    /// Post-commit fan-out.
    pub distribution: Arc<FanOut>,
    /// Lifecycle observers and event stream.
    pub bus: Arc<LifecycleBus>,
    /// The uplink pipeline.
    pub processor: Arc<UplinkProcessor>,
    /// Periodic prune-sync and batch delivery.
    pub jobs: Arc<Jobs>,
    /// Configuration the container was built from.
    pub config: NodeConfig,
}

impl SubsystemContainer {
    /// Open the configured ledger and assemble every subsystem.
    #[instrument(name = "container_init", skip_all)]
    pub fn new(
        config: NodeConfig,
        chain: Arc<dyn ChainReader>,
        downlink: Arc<dyn DownlinkQueue>,
    ) -> Result<Self, ContainerError> {
        let ledger = open_ledger(&config.ledger)?;
        Ok(Self::with_ledger(config, ledger, chain, downlink))
    }

    /// Assemble every subsystem around an existing ledger.
    pub fn with_ledger(
        config: NodeConfig,
        ledger: Arc<dyn LedgerApi>,
        chain: Arc<dyn ChainReader>,
        downlink: Arc<dyn DownlinkQueue>,
    ) -> Self {
        let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
        let policy = config.retry.policy();

        info!("[container] Level 1: chain mirror");
        let mirror = Arc::new(ChainMirror::new(Arc::clone(&ledger), chain, policy));

        info!("[container] Level 2: registrar and distribution");
        let registrar = Arc::new(DeviceRegistrar::new(
            Arc::clone(&ledger),
            Arc::clone(&mirror) as Arc<dyn ChainMirrorApi>,
        ));
        let sinks = build_sinks(&config.distribution, Arc::clone(&clock));
        let distribution = Arc::new(FanOut::new(sinks, policy));
        info!(sinks = ?config.distribution.sinks, "[container] Distribution sinks configured");

        info!("[container] Level 3: uplink processor");
        let bus = Arc::new(LifecycleBus::new());
        if config.pipeline.log_events {
            bus.register(Arc::new(EventLogObserver::new()));
        }
        info!(observers = bus.observer_count(), "[container] Lifecycle bus ready");
        let processor = Arc::new(UplinkProcessor::new(
            Collaborators {
                ledger: Arc::clone(&ledger),
                mirror: Arc::clone(&mirror) as Arc<dyn ChainMirrorApi>,
                registrar: Arc::clone(&registrar) as Arc<dyn DeviceRegistrarApi>,
                verifier: Arc::new(UplinkSignatureVerifier::new()),
                distribution: Arc::clone(&distribution) as Arc<dyn DistributionApi>,
                downlink,
                bus: Arc::clone(&bus),
                clock,
            },
            DeviceLockRegistry::new(),
            ProcessorConfig {
                sync_epoch: config.pipeline.sync_epoch,
            },
        ));

        info!("[container] Level 4: scheduled jobs");
        let jobs = Arc::new(Jobs::new(
            Arc::clone(&ledger),
            Arc::clone(&mirror) as Arc<dyn ChainMirrorApi>,
            Arc::clone(&distribution) as Arc<dyn DistributionApi>,
        ));

        Self {
            ledger,
            mirror,
            registrar,
            distribution,
            bus,
            processor,
            jobs,
            config,
        }
    }

    /// Build the verifier cache. Fatal on failure.
    pub async fn bootstrap(&self) -> Result<usize, ContainerError> {
        let count = self.mirror.initialize_verifiers().await?;
        info!(verifiers = count, "[container] Verifier cache ready");
        Ok(count)
    }
}

fn open_ledger(config: &LedgerConfig) -> Result<Arc<dyn LedgerApi>, ContainerError> {
    match config.backend {
        LedgerBackend::Memory => {
            info!("[container] Using in-memory ledger");
            Ok(Arc::new(LedgerService::new(InMemoryKVStore::new())))
        }
        #[cfg(feature = "rocksdb")]
        LedgerBackend::RocksDb => {
            use crate::adapters::storage::{RocksDbConfig, RocksDbStore};
            let store = RocksDbStore::open(RocksDbConfig {
                path: config.path.clone(),
                ..Default::default()
            })
            .map_err(|e| ContainerError::Ledger(e.to_string()))?;
            Ok(Arc::new(LedgerService::new(store)))
        }
        #[cfg(not(feature = "rocksdb"))]
        LedgerBackend::RocksDb => Err(ContainerError::Ledger(
            "rocksdb backend requested but the `rocksdb` feature is disabled".to_string(),
        )),
    }
}

fn build_sinks(
    config: &DistributionConfig,
    clock: Arc<dyn TimeSource>,
) -> Vec<Arc<dyn DistributionSink>> {
    let timeout = config.request_timeout();
    config
        .sinks
        .iter()
        .map(|kind| -> Arc<dyn DistributionSink> {
            match kind {
                SinkKind::Archive => Arc::new(ArchiveSink::new(
                    config.archive_url.clone(),
                    config.contract_label.clone(),
                    Arc::clone(&clock),
                    timeout,
                )),
                SinkKind::Prover => Arc::new(ProverSink::new(config.prover_url.clone(), timeout)),
                SinkKind::Relay => Arc::new(RelaySink::new(
                    config.relay_url.clone(),
                    config.stream_ids.clone(),
                    timeout,
                )),
            }
        })
        .collect()
}
