//! # Outbound Ports
//!
//! The downlink queue the response is handed to.

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

/// Failure to queue a downlink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Downlink enqueue failed: {0}")]
pub struct DownlinkError(pub String);

/// Queued command channel back to devices, keyed by transport identifier.
///
/// Production: `MqttDownlink` (node-runtime/adapters/mqtt.rs)
/// Testing: `RecordingDownlink` (below)
#[async_trait]
pub trait DownlinkQueue: Send + Sync {
    /// Queue `payload` for the device.
    async fn enqueue(&self, dev_eui: &str, payload: &[u8]) -> Result<(), DownlinkError>;
}

/// Downlink queue that records every enqueue.
#[derive(Default)]
pub struct RecordingDownlink {
    sent: Mutex<Vec<(String, Vec<u8>)>>,
    fail: Mutex<bool>,
}

impl RecordingDownlink {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything queued so far, in order.
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent.lock().clone()
    }

    /// Make subsequent enqueues fail.
    pub fn set_should_fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

#[async_trait]
impl DownlinkQueue for RecordingDownlink {
    async fn enqueue(&self, dev_eui: &str, payload: &[u8]) -> Result<(), DownlinkError> {
        if *self.fail.lock() {
            return Err(DownlinkError("queue unavailable".into()));
        }
        self.sent.lock().push((dev_eui.to_string(), payload.to_vec()));
        Ok(())
    }
}
