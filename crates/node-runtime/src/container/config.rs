//! # Node Configuration
//!
//! Unified configuration for the pipeline, the remote calls and the runtime
//! adapters.
//!
//! ## Loading order
//!
//! 1. Defaults (`NodeConfig::default()`)
//! 2. Optional JSON file (`MU_CONFIG_PATH`, default `console.config.json`)
//! 3. `MU_*` environment variables
//!
//! `validate()` is called once at startup; a failure there is fatal.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::RetryPolicy;
use thiserror::Error;
use tracing::warn;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "MU_CONFIG_PATH";

/// Configuration file used when `MU_CONFIG_PATH` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "console.config.json";

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Uplink pipeline settings.
    pub pipeline: PipelineConfig,
    /// Backoff for chain reads and sink deliveries.
    pub retry: RetryConfig,
    /// Ledger backend.
    pub ledger: LedgerConfig,
    /// Chain RPC endpoint and contract addresses.
    pub chain: ChainConfig,
    /// MQTT broker and topics.
    pub transport: TransportConfig,
    /// Active sinks and their endpoints.
    pub distribution: DistributionConfig,
    /// Periodic jobs.
    pub scheduler: SchedulerConfig,
}

impl NodeConfig {
    /// Load from the file named by `MU_CONFIG_PATH` (or the default path),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a JSON file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Configuration file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };
        Self::from_json(&text).map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse a JSON document. Missing sections keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    /// Apply `MU_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "MU_SYNC_EPOCH", &mut self.pipeline.sync_epoch)?;
        override_parsed(&lookup, "MU_LOG_EVENTS", &mut self.pipeline.log_events)?;

        override_parsed(&lookup, "MU_RETRY_ATTEMPTS", &mut self.retry.max_attempts)?;
        override_parsed(&lookup, "MU_RETRY_BASE_DELAY_MS", &mut self.retry.base_delay_ms)?;
        override_parsed(&lookup, "MU_CALL_TIMEOUT_MS", &mut self.retry.call_timeout_ms)?;

        override_parsed(&lookup, "MU_LEDGER_BACKEND", &mut self.ledger.backend)?;
        if let Some(path) = lookup("MU_LEDGER_PATH") {
            self.ledger.path = PathBuf::from(path);
        }

        override_string(&lookup, "MU_CHAIN_RPC_URL", &mut self.chain.rpc_url);
        override_string(&lookup, "MU_DEVICE_REGISTRY", &mut self.chain.device_registry);
        override_string(&lookup, "MU_ROLLUP", &mut self.chain.rollup);
        override_string(&lookup, "MU_REVENUE_READER", &mut self.chain.revenue_reader);
        override_string(&lookup, "MU_PRICE_CONTEXT", &mut self.chain.price_context);

        override_string(&lookup, "MU_MQTT_HOST", &mut self.transport.host);
        override_parsed(&lookup, "MU_MQTT_PORT", &mut self.transport.port)?;
        override_string(&lookup, "MU_APPLICATION_ID", &mut self.transport.application_id);

        if let Some(value) = lookup("MU_SINKS") {
            self.distribution.sinks = parse_list(&value)
                .map(|s| SinkKind::from_str(&s))
                .collect::<Result<_, _>>()
                .map_err(|_| ConfigError::InvalidEnv {
                    var: "MU_SINKS",
                    value: value.clone(),
                })?;
        }
        override_string(&lookup, "MU_PROVER_URL", &mut self.distribution.prover_url);
        override_string(&lookup, "MU_RELAY_URL", &mut self.distribution.relay_url);
        if let Some(value) = lookup("MU_STREAM_IDS") {
            self.distribution.stream_ids = parse_list(&value).collect();
        }
        override_string(&lookup, "MU_ARCHIVE_URL", &mut self.distribution.archive_url);
        override_string(&lookup, "MU_CONTRACT_LABEL", &mut self.distribution.contract_label);

        override_parsed(
            &lookup,
            "MU_PRUNE_SYNC_INTERVAL_SECS",
            &mut self.scheduler.prune_sync_interval_secs,
        )?;
        override_parsed(&lookup, "MU_BATCH_INTERVAL_SECS", &mut self.scheduler.batch_interval_secs)?;
        Ok(())
    }

    /// Check the configuration is usable.
    ///
    /// # Returns
    ///
    /// Returns `Err` if:
    /// - retries are configured with zero attempts
    /// - the chain RPC URL or a contract address is missing
    /// - the MQTT host or application id is missing
    /// - an active sink has no endpoint
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroRetryAttempts);
        }
        require("chain.rpc_url", &self.chain.rpc_url)?;
        require("chain.device_registry", &self.chain.device_registry)?;
        require("chain.rollup", &self.chain.rollup)?;
        require("chain.revenue_reader", &self.chain.revenue_reader)?;
        require("chain.price_context", &self.chain.price_context)?;
        require("chain.ens_registry", &self.chain.ens_registry)?;
        require("transport.host", &self.transport.host)?;
        require("transport.application_id", &self.transport.application_id)?;

        for sink in &self.distribution.sinks {
            match sink {
                SinkKind::Prover => require("distribution.prover_url", &self.distribution.prover_url)?,
                SinkKind::Relay => {
                    require("distribution.relay_url", &self.distribution.relay_url)?;
                    if self.distribution.stream_ids.is_empty() {
                        return Err(ConfigError::Missing("distribution.stream_ids"));
                    }
                }
                SinkKind::Archive => {
                    require("distribution.archive_url", &self.distribution.archive_url)?
                }
            }
        }
        Ok(())
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing(field))
    } else {
        Ok(())
    }
}

fn parse_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn override_string<F>(lookup: &F, var: &str, target: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(var) {
        *target = value;
    }
}

fn override_parsed<F, T>(lookup: &F, var: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(var) {
        let parsed: Result<T, _> = value.trim().parse();
        match parsed {
            Ok(parsed) => *target = parsed,
            Err(_) => return Err(ConfigError::InvalidEnv { var, value }),
        }
    }
    Ok(())
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Cannot read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    /// The file is not valid configuration JSON.
    #[error("Invalid configuration in {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// An environment override could not be parsed.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    /// A required field is empty.
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// Retries need at least one attempt.
    #[error("retry.max_attempts must be at least 1")]
    ZeroRetryAttempts,
}

// =============================================================================
// Sub-configurations
// =============================================================================

/// Uplink pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Chain reconciliation runs when `nonce % sync_epoch == 0`. Zero disables it.
    pub sync_epoch: u64,
    /// Register the debug-level lifecycle event logger at startup.
    pub log_events: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sync_epoch: mu_06_uplink_processor::DEFAULT_SYNC_EPOCH,
            log_events: true,
        }
    }
}

/// Retry configuration shared by chain reads and sink deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call.
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on each further retry.
    pub base_delay_ms: u64,
    /// Per-attempt timeout. Zero disables the timeout.
    pub call_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            call_timeout_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// The backoff policy these settings describe.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
            .with_timeout(self.call_timeout())
    }

    /// Per-attempt timeout, if any.
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_ms > 0).then(|| Duration::from_millis(self.call_timeout_ms))
    }
}

/// Ledger storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// Process-local ordered map. Lost on restart.
    Memory,
    /// RocksDB on disk. Requires the `rocksdb` feature.
    RocksDb,
}

impl FromStr for LedgerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocksdb" => Ok(Self::RocksDb),
            other => Err(format!("unknown ledger backend: {other}")),
        }
    }
}

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Storage backend.
    pub backend: LedgerBackend,
    /// Database directory for on-disk backends.
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: if cfg!(feature = "rocksdb") {
                LedgerBackend::RocksDb
            } else {
                LedgerBackend::Memory
            },
            path: PathBuf::from("./data/ledger"),
        }
    }
}

/// Chain endpoint and contract addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Contract mapping device keys to token ids.
    pub device_registry: String,
    /// Contract holding the confirmed nonce per token.
    pub rollup: String,
    /// Verifier registry and cross-chain revenue reader.
    pub revenue_reader: String,
    /// Contract reporting the amount owed per token.
    pub price_context: String,
    /// ENS registry used to resolve verifier names.
    pub ens_registry: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            device_registry: "0x39fb420Bd583cCC8Afd1A1eAce2907fe300ABD02".to_string(),
            rollup: String::new(),
            revenue_reader: String::new(),
            price_context: String::new(),
            ens_registry: "0x00000000000C2E074eC69A0bFb2997BA6C7d2e1e".to_string(),
        }
    }
}

/// MQTT transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Application whose device topics are subscribed.
    pub application_id: String,
    /// MQTT client id.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// Delay before reconnecting after a broker error.
    pub reconnect_delay_ms: u64,
    /// LoRaWAN port for downlinks.
    pub downlink_fport: u8,
    /// Request confirmed downlinks.
    pub confirmed_downlinks: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            application_id: String::new(),
            client_id: "meter-uplink-node".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_ms: 1000,
            downlink_fport: 1,
            confirmed_downlinks: false,
        }
    }
}

impl TransportConfig {
    /// Uplink subscription topic.
    pub fn uplink_topic(&self) -> String {
        format!("application/{}/device/+/event/up", self.application_id)
    }

    /// Downlink topic for one device.
    pub fn downlink_topic(&self, dev_eui: &str) -> String {
        format!(
            "application/{}/device/{}/command/down",
            self.application_id, dev_eui
        )
    }
}

/// Kinds of distribution sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Permanent archive upload.
    Archive,
    /// Batch prover.
    Prover,
    /// Stream relay.
    Relay,
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "archive" => Ok(Self::Archive),
            "prover" => Ok(Self::Prover),
            "relay" => Ok(Self::Relay),
            other => Err(format!("unknown sink: {other}")),
        }
    }
}

/// Distribution sinks and endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Active sinks, in delivery order.
    pub sinks: Vec<SinkKind>,
    /// Prover base URL.
    pub prover_url: String,
    /// Relay base URL.
    pub relay_url: String,
    /// Streams the relay publishes to.
    pub stream_ids: Vec<String>,
    /// Archive upload URL.
    pub archive_url: String,
    /// `Contract-Label` tag on archived payloads.
    pub contract_label: String,
    /// HTTP timeout for one delivery.
    pub request_timeout_ms: u64,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            sinks: Vec::new(),
            prover_url: String::new(),
            relay_url: String::new(),
            stream_ids: Vec::new(),
            archive_url: String::new(),
            contract_label: "M3ters".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl DistributionConfig {
    /// HTTP timeout for one delivery.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Periodic jobs. An interval of zero disables the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Prune-sync every device.
    pub prune_sync_interval_secs: u64,
    /// Deliver all pending transactions to the sinks.
    pub batch_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            prune_sync_interval_secs: 3600,
            batch_interval_secs: 86_400,
        }
    }
}

impl SchedulerConfig {
    /// Prune-sync period, `None` when disabled.
    pub fn prune_sync_interval(&self) -> Option<Duration> {
        (self.prune_sync_interval_secs > 0).then(|| Duration::from_secs(self.prune_sync_interval_secs))
    }

    /// Batch delivery period, `None` when disabled.
    pub fn batch_interval(&self) -> Option<Duration> {
        (self.batch_interval_secs > 0).then(|| Duration::from_secs(self.batch_interval_secs))
    }
}
