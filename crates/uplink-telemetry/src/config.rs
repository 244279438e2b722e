//! Telemetry configuration from environment variables.

use std::env;

/// Output format for the console log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, coloured output for development.
    Pretty,
    /// One JSON object per line for log shippers.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Configuration for logging, tracing and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to traces and log lines
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full `EnvFilter` directive
    pub log_level: String,

    /// Console log format
    pub log_format: LogFormat,

    /// Whether spans are exported over OTLP
    pub tracing_enabled: bool,

    /// OpenTelemetry OTLP endpoint
    pub otlp_endpoint: String,

    /// Whether the Prometheus registry is populated
    pub metrics_enabled: bool,

    /// Deployment label (devnet, testnet, mainnet)
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "meter-uplink-node".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            tracing_enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            metrics_enabled: true,
            environment: "testnet".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MU_SERVICE_NAME`: Service name (default: meter-uplink-node)
    /// - `MU_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `MU_LOG_FORMAT`: `pretty` or `json` (default: json inside containers)
    /// - `MU_TRACING_ENABLED`: Export spans over OTLP (default: false)
    /// - `MU_OTLP_ENDPOINT`: OTLP collector (default: http://localhost:4317)
    /// - `MU_METRICS_ENABLED`: Register Prometheus metrics (default: true)
    /// - `MU_ENVIRONMENT`: Deployment label (default: testnet)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();
        let defaults = Self::default();

        Self {
            service_name: env::var("MU_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: env::var("MU_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            log_format: env::var("MU_LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(if is_container {
                    LogFormat::Json
                } else {
                    LogFormat::Pretty
                }),

            tracing_enabled: env::var("MU_TRACING_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.tracing_enabled),

            otlp_endpoint: env::var("MU_OTLP_ENDPOINT").unwrap_or(defaults.otlp_endpoint),

            metrics_enabled: env::var("MU_METRICS_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.metrics_enabled),

            environment: env::var("MU_ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "meter-uplink-node");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.tracing_enabled);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Pretty);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(parse_flag("ON"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
    }
}
