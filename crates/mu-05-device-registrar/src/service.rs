//! # Device Registrar Service

use std::sync::Arc;

use async_trait::async_trait;
use mu_03_ledger::LedgerApi;
use mu_04_chain_mirror::ChainMirrorApi;
use shared_types::{DeviceRecord, PublicKey};
use tracing::{debug, info, warn};
use uplink_telemetry::DEVICES_REGISTERED;

use crate::domain::errors::RegistrarError;
use crate::domain::registration::Registration;
use crate::ports::inbound::DeviceRegistrarApi;

/// Registrar over the ledger and the chain mirror.
pub struct DeviceRegistrar {
    ledger: Arc<dyn LedgerApi>,
    mirror: Arc<dyn ChainMirrorApi>,
}

impl DeviceRegistrar {
    /// Create a registrar.
    pub fn new(ledger: Arc<dyn LedgerApi>, mirror: Arc<dyn ChainMirrorApi>) -> Self {
        Self { ledger, mirror }
    }

    async fn register(
        &self,
        public_key: &PublicKey,
        dev_eui: &str,
    ) -> Result<Registration, RegistrarError> {
        let token_id = self.mirror.token_id_for_public_key(public_key).await?;
        let latest_nonce = self.mirror.get_latest_transaction_nonce(token_id).await?;

        let previous_key = match self.ledger.get_device_by_token_id(token_id)? {
            Some(stale) if stale.public_key != *public_key => {
                self.ledger.delete_device_by_public_key(&stale.public_key)?;
                warn!(
                    token_id,
                    old_key = %stale.public_key,
                    new_key = %public_key,
                    "[mu-05] Token moved to a new key, stale record removed"
                );
                Some(stale.public_key)
            }
            _ => None,
        };

        let record = DeviceRecord::new(*public_key, token_id, latest_nonce).with_dev_eui(dev_eui);
        self.ledger.save_device(&record)?;
        DEVICES_REGISTERED.inc();
        info!(token_id, latest_nonce, "[mu-05] Device registered");

        Ok(match previous_key {
            Some(previous_key) => Registration::Rotated {
                record,
                previous_key,
            },
            None => Registration::Created(record),
        })
    }

    async fn refresh(
        &self,
        mut record: DeviceRecord,
        dev_eui: &str,
    ) -> Result<Registration, RegistrarError> {
        if record.dev_eui.as_deref() != Some(dev_eui) {
            self.ledger.update_device_eui(&record.public_key, dev_eui)?;
            debug!(token_id = record.token_id, "[mu-05] Transport identifier updated");
            record.dev_eui = Some(dev_eui.to_string());
        }

        let latest_nonce = self
            .mirror
            .get_latest_transaction_nonce(record.token_id)
            .await?;
        self.ledger
            .update_device_nonce(&record.public_key, latest_nonce)?;
        record.latest_nonce = latest_nonce;

        Ok(Registration::Refreshed(record))
    }
}

#[async_trait]
impl DeviceRegistrarApi for DeviceRegistrar {
    async fn register_or_refresh(
        &self,
        public_key: &PublicKey,
        dev_eui: &str,
    ) -> Result<Registration, RegistrarError> {
        match self.ledger.get_device_by_public_key(public_key)? {
            Some(record) => self.refresh(record, dev_eui).await,
            None => self.register(public_key, dev_eui).await,
        }
    }

    fn resolve_by_dev_eui(&self, dev_eui: &str) -> Result<DeviceRecord, RegistrarError> {
        self.ledger
            .get_device_by_dev_eui(dev_eui)?
            .ok_or_else(|| RegistrarError::UnknownDevice {
                dev_eui: dev_eui.to_string(),
            })
    }
}
