//! Prometheus metrics for the uplink pipeline.
//!
//! All metrics follow the naming convention: `mu_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // UPLINK PIPELINE
    // =========================================================================

    /// Raw transport messages handed to the processor
    pub static ref UPLINKS_RECEIVED: Counter = Counter::new(
        "mu_uplink_messages_received_total",
        "Total uplink messages received from the transport"
    ).expect("metric creation failed");

    /// Messages that ended without a downlink, labelled by reason
    pub static ref UPLINKS_DROPPED: CounterVec = CounterVec::new(
        Opts::new("mu_uplink_messages_dropped_total", "Uplink messages dropped before a response"),
        &["reason"]
    ).expect("metric creation failed");

    /// Messages that produced a downlink response
    pub static ref UPLINKS_RESPONDED: Counter = Counter::new(
        "mu_uplink_messages_responded_total",
        "Uplink messages answered with a downlink"
    ).expect("metric creation failed");

    /// Transactions committed to the ledger
    pub static ref TRANSACTIONS_ACCEPTED: Counter = Counter::new(
        "mu_ledger_transactions_accepted_total",
        "Transactions durably recorded in the ledger"
    ).expect("metric creation failed");

    /// Devices created by the registrar
    pub static ref DEVICES_REGISTERED: Counter = Counter::new(
        "mu_registrar_devices_registered_total",
        "Device records created from self-identifying payloads"
    ).expect("metric creation failed");

    /// End-to-end pipeline latency
    pub static ref PIPELINE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "mu_uplink_pipeline_duration_seconds",
            "Time spent processing one uplink message"
        ).buckets(exponential_buckets(0.001, 2.0, 15).unwrap_or_default())
    ).expect("metric creation failed");

    /// Devices currently holding a processing lock
    pub static ref ACTIVE_DEVICE_LOCKS: Gauge = Gauge::new(
        "mu_uplink_active_device_locks",
        "Number of devices with an in-flight pipeline"
    ).expect("metric creation failed");

    // =========================================================================
    // CHAIN MIRROR
    // =========================================================================

    /// Prune-and-sync runs, labelled by outcome
    pub static ref CHAIN_SYNCS: CounterVec = CounterVec::new(
        Opts::new("mu_chain_sync_runs_total", "Ledger reconciliations against the chain"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Remote reads that failed after all retries, labelled by call
    pub static ref REMOTE_CALL_FAILURES: CounterVec = CounterVec::new(
        Opts::new("mu_remote_call_failures_total", "Remote chain reads that exhausted their retries"),
        &["call"]
    ).expect("metric creation failed");

    // =========================================================================
    // DISTRIBUTION
    // =========================================================================

    /// Sink deliveries, labelled by sink and outcome
    pub static ref SINK_DELIVERIES: CounterVec = CounterVec::new(
        Opts::new("mu_distribution_deliveries_total", "Batch deliveries per sink"),
        &["sink", "outcome"]
    ).expect("metric creation failed");
}

/// Handle returned once metrics are registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle;

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics that are already present are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(UPLINKS_RECEIVED.clone()),
        Box::new(UPLINKS_DROPPED.clone()),
        Box::new(UPLINKS_RESPONDED.clone()),
        Box::new(TRANSACTIONS_ACCEPTED.clone()),
        Box::new(DEVICES_REGISTERED.clone()),
        Box::new(PIPELINE_DURATION.clone()),
        Box::new(ACTIVE_DEVICE_LOCKS.clone()),
        Box::new(CHAIN_SYNCS.clone()),
        Box::new(REMOTE_CALL_FAILURES.clone()),
        Box::new(SINK_DELIVERIES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle)
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_is_idempotent() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_dropped_counter_by_reason() {
        UPLINKS_DROPPED.with_label_values(&["locked"]).inc();
        assert!(UPLINKS_DROPPED.with_label_values(&["locked"]).get() >= 1.0);
    }

    #[test]
    fn test_encode_contains_registered_metric() {
        register_metrics().unwrap();
        UPLINKS_RECEIVED.inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("mu_uplink_messages_received_total"));
    }

    #[test]
    fn test_histogram_timer_observes_on_drop() {
        let before = PIPELINE_DURATION.get_sample_count();
        {
            let _timer = HistogramTimer::new(&PIPELINE_DURATION);
        }
        assert!(PIPELINE_DURATION.get_sample_count() > before);
    }
}
