//! # Inbound Ports (Driving Ports / API)

use async_trait::async_trait;
use shared_types::{DeviceRecord, PublicKey};

use crate::domain::errors::RegistrarError;
use crate::domain::registration::Registration;

/// Device resolution used by the uplink processor.
#[async_trait]
pub trait DeviceRegistrarApi: Send + Sync {
    /// Create or refresh the record for a key carried in the payload.
    ///
    /// Unknown keys are registered under the token id the chain reports,
    /// replacing any record that held that token under an older key. Known
    /// keys get their transport identifier backfilled and their watermark
    /// re-derived.
    async fn register_or_refresh(
        &self,
        public_key: &PublicKey,
        dev_eui: &str,
    ) -> Result<Registration, RegistrarError>;

    /// Resolve a device from its transport identifier alone.
    fn resolve_by_dev_eui(&self, dev_eui: &str) -> Result<DeviceRecord, RegistrarError>;
}
