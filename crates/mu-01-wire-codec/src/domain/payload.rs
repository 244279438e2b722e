//! Decoded uplink and downlink response shapes.

use serde::{Deserialize, Serialize};
use shared_types::{IdentityError, PublicKey};

/// Bytes before the optional extension block: nonce (4), energy (4), signature (64).
pub const MIN_UPLINK_LEN: usize = 72;

/// Bytes covered by the device signature (nonce + energy).
pub const SIGNED_REGION_LEN: usize = 8;

/// Raw energy units per kWh.
pub const ENERGY_SCALE: f64 = 1e6;

/// Raw voltage units per volt.
pub const VOLTAGE_SCALE: f64 = 10.0;

/// Fixed-point scale of the coordinates.
pub const COORDINATE_SCALE: f64 = 1e5;

/// Optional trailing fields of an uplink. Each is present only when the
/// payload was long enough to carry it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadExtensions {
    /// Supply voltage in volts.
    pub voltage: Option<f64>,
    /// Device public key, lowercase hex without prefix.
    pub device_id: Option<String>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Latitude in degrees.
    pub latitude: Option<f64>,
}

impl PayloadExtensions {
    /// True when no optional field was decoded.
    pub fn is_empty(&self) -> bool {
        self.voltage.is_none()
            && self.device_id.is_none()
            && self.longitude.is_none()
            && self.latitude.is_none()
    }
}

/// An uplink after decoding. Never persisted; the ledger keeps the raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedPayload {
    /// Device-local sequence number.
    pub nonce: u32,
    /// Energy reading in kWh.
    pub energy: f64,
    /// 64-byte signature, lowercase hex.
    pub signature: String,
    /// Trailing fields, `None` when the payload carried none.
    pub extensions: Option<PayloadExtensions>,
}

impl DecodedPayload {
    /// Public key carried in the extension block, if any.
    pub fn public_key(&self) -> Option<Result<PublicKey, IdentityError>> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.device_id.as_deref())
            .map(PublicKey::from_hex)
    }

    /// Latitude, or 0 when absent.
    pub fn latitude(&self) -> f64 {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.latitude)
            .unwrap_or(0.0)
    }

    /// Longitude, or 0 when absent.
    pub fn longitude(&self) -> f64 {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.longitude)
            .unwrap_or(0.0)
    }
}

/// State returned to a device in a downlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseState {
    /// Whether the device should keep its relay closed.
    pub is_on: bool,
    /// Watermark echo; omitted from the wire when `None`.
    pub nonce: Option<u32>,
}

impl ResponseState {
    /// Response without a nonce echo.
    pub fn new(is_on: bool) -> Self {
        Self { is_on, nonce: None }
    }

    /// Response that echoes `nonce`.
    pub fn with_nonce(is_on: bool, nonce: u32) -> Self {
        Self {
            is_on,
            nonce: Some(nonce),
        }
    }
}
