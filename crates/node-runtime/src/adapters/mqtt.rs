//! # MQTT Transport
//!
//! Uplinks arrive on `application/{app}/device/+/event/up`; each message is
//! handed to the processor on its own task. Responses are published to
//! `application/{app}/device/{devEui}/command/down`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mu_06_uplink_processor::{DownlinkError, DownlinkQueue, UplinkProcessorApi};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::container::config::TransportConfig;

/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 100;

/// Build the client handle and its event loop.
pub fn connect(config: &TransportConfig) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    options.set_clean_session(true);
    AsyncClient::new(options, REQUEST_CAPACITY)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DownlinkCommand<'a> {
    dev_eui: &'a str,
    confirmed: bool,
    f_port: u8,
    data: String,
}

/// JSON body of a downlink command.
pub fn downlink_command(
    dev_eui: &str,
    payload: &[u8],
    config: &TransportConfig,
) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&DownlinkCommand {
        dev_eui,
        confirmed: config.confirmed_downlinks,
        f_port: config.downlink_fport,
        data: BASE64.encode(payload),
    })
}

/// Downlink queue publishing commands to the broker.
pub struct MqttDownlink {
    client: AsyncClient,
    config: TransportConfig,
}

impl MqttDownlink {
    /// Publish through `client`.
    pub fn new(client: AsyncClient, config: TransportConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl DownlinkQueue for MqttDownlink {
    async fn enqueue(&self, dev_eui: &str, payload: &[u8]) -> Result<(), DownlinkError> {
        let body = downlink_command(dev_eui, payload, &self.config)
            .map_err(|e| DownlinkError(e.to_string()))?;
        self.client
            .publish(self.config.downlink_topic(dev_eui), QoS::AtLeastOnce, false, body)
            .await
            .map_err(|e| DownlinkError(e.to_string()))
    }
}

/// Drive the event loop until `shutdown` fires.
///
/// The subscription is renewed on every `ConnAck`, since the session is
/// clean. Broker errors are logged and the loop reconnects after
/// `reconnect_delay_ms`.
pub async fn run_uplink_subscriber(
    client: AsyncClient,
    mut eventloop: EventLoop,
    config: TransportConfig,
    processor: Arc<dyn UplinkProcessorApi>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
) {
    let topic = config.uplink_topic();
    let reconnect_delay = Duration::from_millis(config.reconnect_delay_ms);
    info!(host = %config.host, port = config.port, topic = %topic, "[mu-06] Starting MQTT subscriber");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("[mu-06] Shutdown signal received, disconnecting");
                let _ = client.try_disconnect();
                break;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(host = %config.host, "[mu-06] Connected to broker");
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                        error!(error = %e, topic = %topic, "[mu-06] Subscribe failed");
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    info!(topic = %topic, "[mu-06] Subscribed");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let processor = Arc::clone(&processor);
                    tasks.spawn(async move {
                        let outcome = processor.handle_message(&publish.payload).await;
                        debug!(topic = %publish.topic, accepted = outcome.is_accepted(), "[mu-06] Uplink handled");
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "[mu-06] MQTT connection error, reconnecting");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(reconnect_delay) => {}
                    }
                }
            }
        }
    }

    info!("[mu-06] MQTT subscriber stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_downlink_command_shape() {
        let config = TransportConfig {
            application_id: "app".into(),
            downlink_fport: 2,
            ..Default::default()
        };
        let body = downlink_command("0011aabb", &[1, 0, 0, 0, 5, 0], &config).unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["devEui"], "0011aabb");
        assert_eq!(json["confirmed"], false);
        assert_eq!(json["fPort"], 2);
        assert_eq!(json["data"], "AQAAAAUA");
    }

    #[tokio::test]
    async fn test_subscriber_stops_on_shutdown() {
        let config = TransportConfig {
            host: "127.0.0.1".into(),
            port: 1,
            application_id: "app".into(),
            reconnect_delay_ms: 10,
            ..Default::default()
        };
        let (client, eventloop) = connect(&config);
        let processor: Arc<dyn UplinkProcessorApi> = Arc::new(NoopProcessor);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        tokio::time::timeout(
            Duration::from_secs(5),
            run_uplink_subscriber(client, eventloop, config, processor, TaskTracker::new(), shutdown),
        )
        .await
        .unwrap();
    }

    struct NoopProcessor;

    #[async_trait]
    impl UplinkProcessorApi for NoopProcessor {
        async fn handle_message(&self, _raw: &[u8]) -> mu_06_uplink_processor::MessageOutcome {
            mu_06_uplink_processor::MessageOutcome::Dropped(shared_bus::DropReason::InvalidEnvelope)
        }
    }
}
