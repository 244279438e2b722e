//! # Meter Uplink Node
//!
//! Binary entry point: loads configuration, assembles the subsystems and
//! runs the MQTT transport plus the scheduled jobs until Ctrl-C.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (`MU_LOG_*`, `MU_OTLP_ENDPOINT`)
//! 2. Load configuration (file, then `MU_*` overrides) and validate it
//! 3. Build the chain reader, the MQTT client and the subsystem container
//! 4. Bootstrap the verifier cache (fatal on failure)
//! 5. Spawn the uplink subscriber and the periodic jobs
//!
//! ## Data Flow
//!
//! ```text
//! broker ──uplink──▶ mqtt subscriber ──task per message──▶ UplinkProcessor
//!                                                              │
//!   broker ◀──downlink── MqttDownlink ◀──────── response ──────┤
//!                                                              ▼
//!                                   FanOut ──▶ archive / prover / relay
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use mu_06_uplink_processor::UplinkProcessorApi;
use rumqttc::{AsyncClient, EventLoop};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uplink_telemetry::{init_telemetry, TelemetryConfig};

use node_runtime::adapters::chain_rpc::{ChainContracts, JsonRpcChainReader};
use node_runtime::adapters::mqtt::{self, MqttDownlink};
use node_runtime::container::{NodeConfig, SubsystemContainer};

/// How long shutdown waits for in-flight uplinks and deliveries.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The main node runtime orchestrating all subsystems.
pub struct NodeRuntime {
    /// Subsystem container with all initialized services.
    container: Arc<SubsystemContainer>,
    /// Tasks spawned by the transport and the jobs.
    tasks: TaskTracker,
    /// Cancels the transport loop.
    transport_cancel: CancellationToken,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl NodeRuntime {
    /// Wrap an assembled container.
    pub fn new(container: SubsystemContainer) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container: Arc::new(container),
            tasks: TaskTracker::new(),
            transport_cancel: CancellationToken::new(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bootstrap the verifier cache, then spawn the transport and the jobs.
    pub async fn start(&self, client: AsyncClient, eventloop: EventLoop) -> Result<()> {
        info!("Starting meter uplink node");

        let verifiers = self
            .container
            .bootstrap()
            .await
            .context("verifier cache bootstrap")?;
        info!(verifiers, "Verifier cache loaded");

        let scheduler = &self.container.config.scheduler;
        if let Some(period) = scheduler.prune_sync_interval() {
            let jobs = Arc::clone(&self.container.jobs);
            self.tasks
                .spawn(jobs.run_prune_sync(period, self.shutdown_rx.clone()));
        }
        if let Some(period) = scheduler.batch_interval() {
            let jobs = Arc::clone(&self.container.jobs);
            self.tasks
                .spawn(jobs.run_batch_delivery(period, self.shutdown_rx.clone()));
        }

        self.tasks.spawn(mqtt::run_uplink_subscriber(
            client,
            eventloop,
            self.container.config.transport.clone(),
            Arc::clone(&self.container.processor) as Arc<dyn UplinkProcessorApi>,
            self.tasks.clone(),
            self.transport_cancel.clone(),
        ));

        info!("Node started");
        Ok(())
    }

    /// Stop the transport and the jobs, then drain in-flight work.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        self.transport_cancel.cancel();
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        self.tasks.close();
        let drain = async {
            self.tasks.wait().await;
            self.container.processor.wait_for_distribution().await;
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            warn!(timeout_secs = DRAIN_TIMEOUT.as_secs(), "Shutdown drain timed out");
        }

        info!("Shutdown complete");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env()).context("telemetry")?;

    let config = NodeConfig::load().context("loading configuration")?;
    config.validate().context("invalid configuration")?;

    let contracts = ChainContracts::from_config(&config.chain).context("contract addresses")?;
    let chain = JsonRpcChainReader::new(
        config.chain.rpc_url.clone(),
        contracts,
        config.retry.call_timeout().unwrap_or(Duration::from_secs(30)),
    )
    .context("chain reader")?;

    let (client, eventloop) = mqtt::connect(&config.transport);
    let downlink = MqttDownlink::new(client.clone(), config.transport.clone());

    let container = SubsystemContainer::new(config, Arc::new(chain), Arc::new(downlink))
        .context("assembling subsystems")?;

    let runtime = NodeRuntime::new(container);
    runtime.start(client, eventloop).await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
