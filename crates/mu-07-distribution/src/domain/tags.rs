//! Archive metadata tags.

use mu_01_wire_codec::decode;
use serde::{Deserialize, Serialize};
use shared_types::BatchTransactionPayload;

use crate::domain::errors::SinkError;

/// One name/value tag attached to an archived payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
    /// Tag value; empty when the field is absent.
    pub value: String,
}

impl Tag {
    fn new(name: &str, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Tags describing one archived uplink.
///
/// Extension fields that the payload does not carry are emitted with an
/// empty value so every upload has the same tag set.
pub fn archive_tags(
    payload: &BatchTransactionPayload,
    contract_label: &str,
    timestamp_ms: u64,
) -> Result<Vec<Tag>, SinkError> {
    let raw = hex::decode(&payload.message).map_err(|e| SinkError::Encoding(e.to_string()))?;
    let decoded = decode(&raw).map_err(|e| SinkError::Encoding(e.to_string()))?;
    let ext = decoded.extensions.unwrap_or_default();
    let opt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();

    Ok(vec![
        Tag::new("Contract-Label", contract_label),
        Tag::new("Contract-Use", "M3tering Protocol"),
        Tag::new("Content-Type", "text/plain"),
        Tag::new("M3ter-ID", payload.m3ter_id),
        Tag::new("Timestamp", timestamp_ms),
        Tag::new("Nonce", decoded.nonce),
        Tag::new("Energy", decoded.energy),
        Tag::new("Signature", &decoded.signature),
        Tag::new("Voltage", opt(ext.voltage)),
        Tag::new("Device-ID", ext.device_id.unwrap_or_default()),
        Tag::new("Longitude", opt(ext.longitude)),
        Tag::new("Latitude", opt(ext.latitude)),
    ])
}
