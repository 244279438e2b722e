//! # Uplink Telemetry
//!
//! Observability for the meter uplink node.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` console layer (pretty or JSON) behind an `EnvFilter`
//! - **Traces**: optional OpenTelemetry OTLP export
//! - **Metrics**: Prometheus registry with pipeline, chain and sink counters
//!
//! ## Usage
//!
//! ```rust,ignore
//! use uplink_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//! }
//! ```

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::{record_device, uplink_span};
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, ACTIVE_DEVICE_LOCKS,
    CHAIN_SYNCS, DEVICES_REGISTERED, PIPELINE_DURATION, REMOTE_CALL_FAILURES, SINK_DELIVERIES,
    TRANSACTIONS_ACCEPTED, UPLINKS_DROPPED, UPLINKS_RECEIVED, UPLINKS_RESPONDED,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Subscriber or OTLP pipeline could not be installed.
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    /// Prometheus registration or encoding failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// The configuration could not be applied.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging, tracing and metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
/// When dropped, pending spans are flushed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    let tracing = tracing_setup::init_tracing(&config)?;

    tracing::debug!(
        service = %config.service_name,
        format = ?config.log_format,
        metrics = config.metrics_enabled,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        _tracing: tracing,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    _tracing: Option<TracingGuard>,
    _metrics: Option<MetricsHandle>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
