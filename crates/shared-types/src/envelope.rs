//! # Transport Envelope
//!
//! The JSON document delivered by the message-queue layer for each uplink:
//!
//! ```json
//! { "deviceInfo": { "devEui": "0102030405060708" }, "data": "<base64>" }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::errors::EnvelopeError;

/// Device section of the envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Transport-layer device identifier.
    #[serde(default)]
    pub dev_eui: Option<String>,
}

/// Inbound uplink as received from the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportEnvelope {
    /// Device metadata.
    #[serde(default)]
    pub device_info: DeviceInfo,
    /// Base64 encoded uplink payload.
    #[serde(default)]
    pub data: String,
}

impl TransportEnvelope {
    /// Parse the envelope from raw transport bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::InvalidJson(e.to_string()))
    }

    /// Build an envelope around raw payload bytes.
    pub fn new(dev_eui: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            device_info: DeviceInfo {
                dev_eui: Some(dev_eui.into()),
            },
            data: STANDARD.encode(payload),
        }
    }

    /// Transport identifier, if present and non-empty.
    pub fn dev_eui(&self) -> Result<&str, EnvelopeError> {
        match self.device_info.dev_eui.as_deref() {
            Some(eui) if !eui.is_empty() => Ok(eui),
            _ => Err(EnvelopeError::MissingDeviceIdentifier),
        }
    }

    /// Base64-decode the payload.
    pub fn payload(&self) -> Result<Vec<u8>, EnvelopeError> {
        STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| EnvelopeError::InvalidPayloadEncoding(e.to_string()))
    }

    /// Serialize back to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::InvalidJson(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope() {
        let raw = br#"{"deviceInfo":{"devEui":"a1b2"},"data":"AQID"}"#;
        let env = TransportEnvelope::parse(raw).unwrap();
        assert_eq!(env.dev_eui().unwrap(), "a1b2");
        assert_eq!(env.payload().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_dev_eui() {
        let env = TransportEnvelope::parse(br#"{"data":"AQID"}"#).unwrap();
        assert!(matches!(
            env.dev_eui(),
            Err(EnvelopeError::MissingDeviceIdentifier)
        ));

        let env = TransportEnvelope::parse(br#"{"deviceInfo":{"devEui":""},"data":""}"#).unwrap();
        assert!(env.dev_eui().is_err());
    }

    #[test]
    fn test_invalid_json() {
        let err = TransportEnvelope::parse(b"not json").unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidJson(_)));
    }

    #[test]
    fn test_new_and_serialize() {
        let env = TransportEnvelope::new("eui-1", &[0xff]);
        let bytes = env.to_bytes().unwrap();
        let parsed = TransportEnvelope::parse(&bytes).unwrap();
        assert_eq!(parsed, env);
        assert!(String::from_utf8(bytes).unwrap().contains("\"deviceInfo\""));
    }
}
