//! # Uplink / Downlink Codec
//!
//! ## Uplink layout (big-endian)
//!
//! ```text
//! [0..4)    nonce       u32
//! [4..8)    energy      u32 / 1e6 kWh
//! [8..72)   signature   64 bytes
//! then, each only if enough bytes remain:
//!           voltage     u16 / 10
//!           device id   32 bytes
//!           longitude   i24 / 1e5
//!           latitude    i24 / 1e5
//! ```
//!
//! ## Downlink layout
//!
//! ```text
//! is_on (1) | nonce u32 BE (4, only when present) | latitude f32 BE (4) | longitude f32 BE (4)
//! ```

use crate::domain::errors::CodecError;
use crate::domain::payload::{
    DecodedPayload, PayloadExtensions, ResponseState, COORDINATE_SCALE, ENERGY_SCALE,
    MIN_UPLINK_LEN, VOLTAGE_SCALE,
};

/// Sequential big-endian reader over the extension block.
struct Cursor<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(len)?;
        let slice = self.buf.get(self.offset..end)?;
        self.offset = end;
        Some(slice)
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    fn i24(&mut self) -> Option<i32> {
        self.take(3).map(read_i24_be)
    }
}

fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Sign-extend a 3-byte big-endian integer.
fn read_i24_be(bytes: &[u8]) -> i32 {
    let raw = i32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
    (raw << 8) >> 8
}

/// Decode a raw uplink.
pub fn decode(bytes: &[u8]) -> Result<DecodedPayload, CodecError> {
    if bytes.len() < MIN_UPLINK_LEN {
        return Err(CodecError::MalformedPayload {
            length: bytes.len(),
            minimum: MIN_UPLINK_LEN,
        });
    }

    let nonce = read_u32_be(&bytes[0..4]);
    let energy = f64::from(read_u32_be(&bytes[4..8])) / ENERGY_SCALE;
    let signature = hex::encode(&bytes[8..MIN_UPLINK_LEN]);

    let mut cursor = Cursor::new(bytes, MIN_UPLINK_LEN);
    let mut ext = PayloadExtensions::default();

    ext.voltage = cursor.u16().map(|v| f64::from(v) / VOLTAGE_SCALE);
    if ext.voltage.is_some() {
        ext.device_id = cursor.take(32).map(hex::encode);
    }
    if ext.device_id.is_some() {
        ext.longitude = cursor.i24().map(|v| f64::from(v) / COORDINATE_SCALE);
    }
    if ext.longitude.is_some() {
        ext.latitude = cursor.i24().map(|v| f64::from(v) / COORDINATE_SCALE);
    }

    Ok(DecodedPayload {
        nonce,
        energy,
        signature,
        extensions: (!ext.is_empty()).then_some(ext),
    })
}

/// Encode a downlink response.
pub fn encode(state: &ResponseState, latitude: f64, longitude: f64) -> Vec<u8> {
    let mut out = Vec::with_capacity(13);
    out.push(u8::from(state.is_on));
    if let Some(nonce) = state.nonce {
        out.extend_from_slice(&nonce.to_be_bytes());
    }
    out.extend_from_slice(&(latitude as f32).to_be_bytes());
    out.extend_from_slice(&(longitude as f32).to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "000000000061919cbc1b88ebcf09830c89958803d100735ba94a9d037e5ce56da4d1caf891aca3b98b72bc9d0ebaa36248dd894081f022bd32d210b523ab655395f64a65586d5f01";

    fn header(nonce: u32, energy: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&nonce.to_be_bytes());
        buf.extend_from_slice(&energy.to_be_bytes());
        buf.extend_from_slice(&[0xAB; 64]);
        buf
    }

    #[test]
    fn test_decode_sample_core_fields() {
        let bytes = hex::decode(SAMPLE).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.nonce, 0);
        assert!((decoded.energy - 6.394268).abs() < 1e-9);
        assert_eq!(decoded.signature, &SAMPLE[16..]);
        assert!(decoded.extensions.is_none());
    }

    #[test]
    fn test_decode_nonce_and_energy() {
        let bytes = header(0x61, 0x919c_bc1b);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.nonce, 97);
        assert!((decoded.energy - f64::from(0x919c_bc1bu32) / 1e6).abs() < 1e-9);
        assert_eq!(decoded.signature, "ab".repeat(64));
        assert!(decoded.extensions.is_none());
    }

    #[test]
    fn test_decode_too_short() {
        let err = decode(&[0u8; 71]).unwrap_err();
        assert_eq!(
            err,
            CodecError::MalformedPayload {
                length: 71,
                minimum: 72
            }
        );
        assert!(err.to_string().contains("71 bytes"));
    }

    #[test]
    fn test_decode_full_extension() {
        let mut bytes = header(5, 1_000_000);
        bytes.extend_from_slice(&2305u16.to_be_bytes());
        bytes.extend_from_slice(&[0x11; 32]);
        // longitude -0.12345 => -12345
        bytes.extend_from_slice(&(-12345i32).to_be_bytes()[1..]);
        // latitude 51.50735 => 5150735
        bytes.extend_from_slice(&5_150_735i32.to_be_bytes()[1..]);

        let decoded = decode(&bytes).unwrap();
        let ext = decoded.extensions.clone().unwrap();
        assert_eq!(ext.voltage, Some(230.5));
        assert_eq!(ext.device_id.as_deref(), Some("11".repeat(32).as_str()));
        assert!((ext.longitude.unwrap() + 0.12345).abs() < 1e-9);
        assert!((ext.latitude.unwrap() - 51.50735).abs() < 1e-9);
        assert_eq!(decoded.energy, 1.0);
        assert!(decoded.public_key().unwrap().is_ok());
    }

    #[test]
    fn test_decode_partial_extension_is_not_an_error() {
        let mut bytes = header(1, 0);
        bytes.extend_from_slice(&2200u16.to_be_bytes());
        bytes.extend_from_slice(&[0x22; 10]);

        let decoded = decode(&bytes).unwrap();
        let ext = decoded.extensions.unwrap();
        assert_eq!(ext.voltage, Some(220.0));
        assert!(ext.device_id.is_none());
        assert!(ext.longitude.is_none());
        assert!(ext.latitude.is_none());
    }

    #[test]
    fn test_decode_single_trailing_byte_has_no_extension() {
        let mut bytes = header(1, 0);
        bytes.push(0x01);
        assert!(decode(&bytes).unwrap().extensions.is_none());
    }

    #[test]
    fn test_i24_sign_extension() {
        assert_eq!(read_i24_be(&[0xff, 0xff, 0xff]), -1);
        assert_eq!(read_i24_be(&[0x80, 0x00, 0x00]), -8_388_608);
        assert_eq!(read_i24_be(&[0x7f, 0xff, 0xff]), 8_388_607);
    }

    #[test]
    fn test_encode_without_nonce() {
        let out = encode(&ResponseState::new(true), 1.5, -2.25);
        assert_eq!(out.len(), 9);
        assert_eq!(out[0], 1);
        assert_eq!(&out[1..5], &1.5f32.to_be_bytes());
        assert_eq!(&out[5..9], &(-2.25f32).to_be_bytes());
    }

    #[test]
    fn test_encode_with_zero_nonce() {
        let out = encode(&ResponseState::with_nonce(false, 0), 0.0, 0.0);
        assert_eq!(out.len(), 13);
        assert_eq!(out[0], 0);
        assert_eq!(&out[1..5], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_nonce_big_endian() {
        let out = encode(&ResponseState::with_nonce(true, 0x0102_0304), 0.0, 0.0);
        assert_eq!(&out[..5], &[1, 1, 2, 3, 4]);
    }

    proptest! {
        #[test]
        fn prop_decode_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 72..150)) {
            let a = decode(&bytes).unwrap();
            let b = decode(&bytes).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_short_input_always_rejected(bytes in proptest::collection::vec(any::<u8>(), 0..72)) {
            let is_malformed = matches!(decode(&bytes), Err(CodecError::MalformedPayload { .. }));
            prop_assert!(is_malformed);
        }
    }
}
